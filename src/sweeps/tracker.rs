//! Per-mode match tracking
//!
//! A match is keyed by the sorted names of the group that reported the kill.
//! It collects distinct victims until the mode's kill requirement is met, at
//! which point a win is emitted once per [`WinKey`]. Matches that run past
//! their time budget (base timeout plus per-kill extensions, measured from the
//! match start) are dropped by [`MatchTracker::purge`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::ModeConfig;
use crate::models::{sorted_names, team_key, KillEvent, Outcome};
use crate::sweeps::equipment::EquipmentBook;

pub const ANNOUNCEMENT_SEPARATOR: &str = "=================================";

#[derive(Debug, Clone, Copy)]
pub struct TrackerTimings {
    pub base_timeout: Duration,
    pub kill_extension: Duration,
    /// How long completed win keys are remembered.
    pub win_key_retention: Duration,
}

impl Default for TrackerTimings {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_secs(150),
            kill_extension: Duration::from_secs(30),
            win_key_retention: Duration::from_secs(4800),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    pub mode: String,
    /// Sorted member names.
    pub team: Vec<String>,
    pub victims: BTreeSet<String>,
    pub started_at: DateTime<Utc>,
    pub last_kill_at: DateTime<Utc>,
    pub timeout_extension: chrono::Duration,
}

impl Match {
    fn new(mode: &str, team: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            mode: mode.to_string(),
            team,
            victims: BTreeSet::new(),
            started_at: now,
            last_kill_at: now,
            timeout_extension: chrono::Duration::zero(),
        }
    }

    pub fn kills(&self) -> usize {
        self.victims.len()
    }

    pub fn progress_pct(&self, required_kills: usize) -> u32 {
        if required_kills == 0 {
            return 100;
        }
        (self.kills() * 100 / required_kills) as u32
    }

    /// Expiry is measured from the match start, not from the last kill.
    pub fn is_expired(&self, now: DateTime<Utc>, base_timeout: chrono::Duration) -> bool {
        now - self.started_at > base_timeout + self.timeout_extension
    }
}

/// Identity of a completed match; a key yields at most one win.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WinKey {
    pub team: String,
    pub victims: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct MatchWin {
    pub mode: String,
    /// Sorted winning members.
    pub team: Vec<String>,
    /// Sorted defeated players.
    pub defeated: Vec<String>,
    pub event_timestamp: String,
    pub completed_at: DateTime<Utc>,
    pub message: String,
}

impl MatchWin {
    pub fn team_key(&self) -> String {
        self.team.join(",")
    }

    pub fn defeated_key(&self) -> String {
        self.defeated.join(",")
    }

    /// The two history records a win produces.
    pub fn outcomes(&self) -> [(String, Outcome); 2] {
        [
            (self.team_key(), Outcome::Win),
            (self.defeated_key(), Outcome::Loss),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ExpiredMatch {
    pub team: Vec<String>,
    pub kills: usize,
    pub required_kills: usize,
    pub elapsed: chrono::Duration,
}

pub struct MatchTracker {
    mode: ModeConfig,
    base_timeout: chrono::Duration,
    kill_extension: chrono::Duration,
    win_key_retention: chrono::Duration,
    active: HashMap<String, Match>,
    wins: HashMap<WinKey, DateTime<Utc>>,
    equipment: Arc<EquipmentBook>,
}

impl MatchTracker {
    pub fn new(mode: ModeConfig, timings: TrackerTimings, equipment: Arc<EquipmentBook>) -> Self {
        Self {
            mode,
            base_timeout: to_chrono(timings.base_timeout),
            kill_extension: to_chrono(timings.kill_extension),
            win_key_retention: to_chrono(timings.win_key_retention),
            active: HashMap::new(),
            wins: HashMap::new(),
            equipment,
        }
    }

    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    pub fn accepts(&self, event: &KillEvent) -> bool {
        self.mode.accepts(event)
    }

    pub fn get_match<S: AsRef<str>>(&self, members: &[S]) -> Option<&Match> {
        self.active.get(&team_key(members))
    }

    /// Feed one eligible event into the tracker.
    pub fn process(&mut self, event: &KillEvent, now: DateTime<Utc>) -> Option<MatchWin> {
        self.equipment.update_from(&event.participants);

        if !event.is_in_group_kill() {
            return None;
        }

        let team = sorted_names(&event.group_member_names());
        let match_id = team.join(",");
        let victim = event.victim.name.clone();

        let entry = self
            .active
            .entry(match_id.clone())
            .or_insert_with(|| Match::new(&self.mode.name, team, now));

        if !entry.victims.contains(&victim) {
            entry.victims.insert(victim.clone());
            entry.last_kill_at = now;
            entry.timeout_extension = entry.timeout_extension + self.kill_extension;
        }

        info!(
            mode = %self.mode.label(),
            killer = %event.killer.name,
            victim = %victim,
            group = %match_id,
            progress = entry.progress_pct(self.mode.required_kills),
            timestamp = %event.timestamp,
            participants = event.number_of_participants,
            "⚔️ in-group kill recorded"
        );

        if entry.kills() < self.mode.required_kills {
            return None;
        }

        let key = WinKey {
            team: match_id.clone(),
            victims: entry.victims.iter().cloned().collect::<Vec<_>>().join(","),
            timestamp: event.timestamp.clone(),
        };
        if self.wins.contains_key(&key) {
            debug!(mode = %self.mode.label(), group = %match_id, "win already announced");
            return None;
        }
        self.wins.insert(key, now);

        let finished = self.active.remove(&match_id)?;
        let defeated: Vec<String> = finished.victims.into_iter().collect();
        let message = format_win_message(
            &self.mode.label(),
            &finished.team,
            &defeated,
            &event.timestamp,
            &self.equipment,
        );

        info!(
            mode = %self.mode.label(),
            winners = %finished.team.join(", "),
            defeated = %defeated.join(", "),
            "🏆 sweep completed"
        );

        Some(MatchWin {
            mode: self.mode.name.clone(),
            team: finished.team,
            defeated,
            event_timestamp: event.timestamp.clone(),
            completed_at: now,
            message,
        })
    }

    /// Drop matches that ran past base timeout plus earned extensions.
    pub fn purge(&mut self, now: DateTime<Utc>) -> Vec<ExpiredMatch> {
        let base = self.base_timeout;
        let expired_ids: Vec<String> = self
            .active
            .iter()
            .filter(|(_, m)| m.is_expired(now, base))
            .map(|(id, _)| id.clone())
            .collect();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            let Some(m) = self.active.remove(&id) else {
                continue;
            };
            let elapsed = now - m.started_at;
            info!(
                mode = %self.mode.label(),
                group = %m.team.join(", "),
                progress = m.progress_pct(self.mode.required_kills),
                "⌛ match timed out after {}m {}s",
                elapsed.num_seconds() / 60,
                elapsed.num_seconds() % 60
            );
            expired.push(ExpiredMatch {
                kills: m.kills(),
                required_kills: self.mode.required_kills,
                team: m.team,
                elapsed,
            });
        }

        let retention = self.win_key_retention;
        self.wins.retain(|_, recorded| now - *recorded <= retention);

        expired
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Win announcement, one gear line per winning member.
pub fn format_win_message(
    mode_label: &str,
    team: &[String],
    defeated: &[String],
    timestamp: &str,
    equipment: &EquipmentBook,
) -> String {
    let mut lines = vec![
        format!("🔥 **{mode_label} Hellgate Win Detected!**"),
        format!("🏆 **Winning Team:** {}", team.join(", ")),
        format!("💀 **Defeated Team:** {}", defeated.join(", ")),
        format!("🕒 **Timestamp:** {timestamp}"),
    ];
    for member in team {
        match equipment.get(member) {
            Some(gear) => lines.push(format!("🛡️ {member}: {}", gear.describe())),
            None => lines.push(format!("🛡️ {member}: *gear unknown*")),
        }
    }
    lines.push(ANNOUNCEMENT_SEPARATOR.to_string());
    lines.join("\n")
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Combatant, Equipment, Item};

    fn player(name: &str) -> Combatant {
        Combatant {
            name: name.into(),
            average_item_power: 1000.0,
            ..Default::default()
        }
    }

    fn kill(id: u64, killer: &str, victim: &str, group: &[&str], ts: &str) -> KillEvent {
        let members: Vec<Combatant> = group.iter().map(|n| player(n)).collect();
        KillEvent {
            event_id: id,
            timestamp: ts.into(),
            killer: player(killer),
            victim: player(victim),
            participants: members.clone(),
            group_member_count: members.len(),
            number_of_participants: members.len(),
            group_members: members,
        }
    }

    fn tracker() -> MatchTracker {
        MatchTracker::new(
            ModeConfig::two_vs_two(1),
            TrackerTimings::default(),
            Arc::new(EquipmentBook::new()),
        )
    }

    #[test]
    fn test_two_kills_complete_a_sweep() {
        let mut t = tracker();
        let now = Utc::now();
        assert!(t
            .process(&kill(1, "Alice", "Eve", &["Bob", "Alice"], "t1"), now)
            .is_none());
        let win = t
            .process(&kill(2, "Bob", "Frank", &["Alice", "Bob"], "t2"), now)
            .unwrap();

        assert_eq!(win.team, vec!["Alice", "Bob"]);
        assert_eq!(win.defeated, vec!["Eve", "Frank"]);
        assert_eq!(win.event_timestamp, "t2");
        assert!(t.is_empty());
        assert!(win.message.contains("2V2 Hellgate Win Detected"));
        assert!(win.message.contains("**Winning Team:** Alice, Bob"));
        assert!(win.message.contains("**Defeated Team:** Eve, Frank"));
    }

    #[test]
    fn test_repeat_victim_does_not_extend_twice() {
        let mut t = tracker();
        let now = Utc::now();
        t.process(&kill(1, "Alice", "Eve", &["Alice", "Bob"], "t1"), now);
        t.process(&kill(2, "Bob", "Eve", &["Alice", "Bob"], "t2"), now);

        let m = t.get_match(&["Alice", "Bob"]).unwrap();
        assert_eq!(m.kills(), 1);
        assert_eq!(m.timeout_extension, chrono::Duration::seconds(30));
    }

    #[test]
    fn test_kill_by_non_member_is_ignored() {
        let mut t = tracker();
        let e = kill(1, "Mallory", "Eve", &["Alice", "Bob"], "t1");
        assert!(t.process(&e, Utc::now()).is_none());
        assert!(t.is_empty());

        let mut no_group = kill(2, "Alice", "Eve", &["Alice"], "t2");
        no_group.group_members.clear();
        assert!(t.process(&no_group, Utc::now()).is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn test_participant_gear_recorded_even_when_rejected() {
        let book = Arc::new(EquipmentBook::new());
        let mut t = MatchTracker::new(ModeConfig::two_vs_two(1), TrackerTimings::default(), book.clone());
        let mut e = kill(1, "Mallory", "Eve", &["Alice", "Bob"], "t1");
        e.participants[0].equipment = Equipment {
            main_hand: Some(Item {
                item_type: Some("T4_MAIN_SPEAR@1".into()),
            }),
            ..Default::default()
        };
        t.process(&e, Utc::now());
        assert_eq!(
            book.get("Alice").unwrap().weapon.as_deref(),
            Some("MAIN SPEAR")
        );
    }

    #[test]
    fn test_same_win_key_announced_once() {
        let mut t = MatchTracker::new(
            ModeConfig {
                required_kills: 1,
                ..ModeConfig::two_vs_two(1)
            },
            TrackerTimings::default(),
            Arc::new(EquipmentBook::new()),
        );
        let now = Utc::now();
        let e = kill(1, "Alice", "Eve", &["Alice", "Bob"], "t1");
        assert!(t.process(&e, now).is_some());
        assert!(t.process(&e, now).is_none());
    }

    #[test]
    fn test_win_key_forgotten_after_retention() {
        let mut t = MatchTracker::new(
            ModeConfig {
                required_kills: 1,
                ..ModeConfig::two_vs_two(1)
            },
            TrackerTimings::default(),
            Arc::new(EquipmentBook::new()),
        );
        let start = Utc::now();
        let e = kill(1, "Alice", "Eve", &["Alice", "Bob"], "t1");
        assert!(t.process(&e, start).is_some());

        let inside = start + chrono::Duration::seconds(60);
        assert!(t.purge(inside).is_empty());
        assert!(t.process(&e, inside).is_none());

        // 4800s retention; the stale match from the repeat is purged as well.
        let after = start + chrono::Duration::seconds(4801);
        assert_eq!(t.purge(after).len(), 1);
        assert!(t.is_empty());
        assert!(t.process(&e, after).is_some());
    }

    #[test]
    fn test_purge_uses_start_plus_extension() {
        let mut t = tracker();
        let start = Utc::now();
        t.process(&kill(1, "Alice", "Eve", &["Alice", "Bob"], "t1"), start);

        // 150s base + 30s for the one kill
        let kept = t.purge(start + chrono::Duration::seconds(180));
        assert!(kept.is_empty());
        assert_eq!(t.len(), 1);

        let expired = t.purge(start + chrono::Duration::seconds(181));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].kills, 1);
        assert_eq!(expired[0].required_kills, 2);
        assert!(t.is_empty());
    }

    #[test]
    fn test_late_kill_does_not_reset_start() {
        let mut t = tracker();
        let start = Utc::now();
        t.process(&kill(1, "Alice", "Eve", &["Alice", "Bob"], "t1"), start);
        let later = start + chrono::Duration::seconds(170);
        t.process(&kill(2, "Alice", "Eve", &["Alice", "Bob"], "t2"), later);

        let m = t.get_match(&["Alice", "Bob"]).unwrap();
        assert_eq!(m.started_at, start);
        assert_eq!(m.progress_pct(2), 50);
        assert_eq!(t.purge(start + chrono::Duration::seconds(181)).len(), 1);
    }

    #[test]
    fn test_win_message_lists_gear_or_unknown() {
        let book = EquipmentBook::new();
        let mut alice = player("Alice");
        alice.equipment.main_hand = Some(Item {
            item_type: Some("T5_2H_BOW@2".into()),
        });
        book.update_from(&[alice]);

        let msg = format_win_message(
            "2V2",
            &["Alice".to_string(), "Bob".to_string()],
            &["Eve".to_string(), "Frank".to_string()],
            "2024-05-01T12:00:00Z",
            &book,
        );
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines[0], "🔥 **2V2 Hellgate Win Detected!**");
        assert_eq!(lines[3], "🕒 **Timestamp:** 2024-05-01T12:00:00Z");
        assert_eq!(lines[4], "🛡️ Alice: 2H BOW, empty, empty, empty");
        assert_eq!(lines[5], "🛡️ Bob: *gear unknown*");
        assert_eq!(lines[6], ANNOUNCEMENT_SEPARATOR);
    }
}
