//! Last-seen gear per player.
//!
//! Advisory data for announcements only. Every participant of every fetched
//! event overwrites its own snapshot; no history is kept.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::{Combatant, Item};

const SET_SUFFIXES: &[&str] = &["_SET1", "_SET2", "_SET3"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GearSnapshot {
    pub weapon: Option<String>,
    pub head: Option<String>,
    pub armor: Option<String>,
    pub shoes: Option<String>,
}

impl GearSnapshot {
    pub fn from_combatant(combatant: &Combatant) -> Self {
        let eq = &combatant.equipment;
        Self {
            weapon: slot_label(eq.main_hand.as_ref()),
            head: slot_label(eq.head.as_ref()),
            armor: slot_label(eq.armor.as_ref()),
            shoes: slot_label(eq.shoes.as_ref()),
        }
    }

    /// `weapon, head, armor, shoes`
    pub fn describe(&self) -> String {
        [&self.weapon, &self.head, &self.armor, &self.shoes]
            .iter()
            .map(|slot| slot.as_deref().unwrap_or("empty"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn slot_label(item: Option<&Item>) -> Option<String> {
    item.and_then(|i| i.item_type.as_deref())
        .and_then(normalize_item_name)
}

/// `T6_HEAD_CLOTH_SET1@2` -> `HEAD CLOTH`
pub fn normalize_item_name(raw: &str) -> Option<String> {
    let mut name = strip_tier_prefix(raw.trim());
    if let Some((base, _enchant)) = name.split_once('@') {
        name = base;
    }

    let mut name = name.to_string();
    for suffix in SET_SUFFIXES {
        name = name.replace(suffix, "");
    }
    let name = name.replace('_', " ").trim().to_string();

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn strip_tier_prefix(name: &str) -> &str {
    let Some(rest) = name.strip_prefix('T') else {
        return name;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return name;
    }
    rest[digits..].strip_prefix('_').unwrap_or(name)
}

/// Process-wide gear store, last writer wins.
#[derive(Default)]
pub struct EquipmentBook {
    snapshots: RwLock<HashMap<String, GearSnapshot>>,
}

impl EquipmentBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_from(&self, participants: &[Combatant]) {
        if participants.is_empty() {
            return;
        }
        let mut snapshots = self.snapshots.write();
        for p in participants.iter().filter(|p| !p.name.is_empty()) {
            snapshots.insert(p.name.clone(), GearSnapshot::from_combatant(p));
        }
    }

    pub fn get(&self, player: &str) -> Option<GearSnapshot> {
        self.snapshots.read().get(player).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}
