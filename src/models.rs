use serde::{Deserialize, Deserializer, Serialize};

/// A single kill event as returned by the gameinfo events endpoint.
///
/// Every field defaults when missing so one malformed entry never fails the
/// whole batch; an event with missing data simply fails mode eligibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillEvent {
    #[serde(rename = "EventId", default, deserialize_with = "null_as_default")]
    pub event_id: u64,
    /// Source timestamp, kept verbatim for announcements and win keys.
    #[serde(rename = "TimeStamp", default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(rename = "Killer", default, deserialize_with = "null_as_default")]
    pub killer: Combatant,
    #[serde(rename = "Victim", default, deserialize_with = "null_as_default")]
    pub victim: Combatant,
    #[serde(rename = "Participants", default, deserialize_with = "null_as_default")]
    pub participants: Vec<Combatant>,
    #[serde(rename = "GroupMembers", default, deserialize_with = "null_as_default")]
    pub group_members: Vec<Combatant>,
    #[serde(rename = "groupMemberCount", default, deserialize_with = "null_as_default")]
    pub group_member_count: usize,
    #[serde(rename = "numberOfParticipants", default, deserialize_with = "null_as_default")]
    pub number_of_participants: usize,
}

impl KillEvent {
    pub fn group_member_names(&self) -> Vec<&str> {
        self.group_members.iter().map(|m| m.name.as_str()).collect()
    }

    /// Only kills landed by a member of the reporting group count toward a match.
    pub fn is_in_group_kill(&self) -> bool {
        !self.group_members.is_empty()
            && self.group_members.iter().any(|m| m.name == self.killer.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Combatant {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "AverageItemPower", default, deserialize_with = "null_as_default")]
    pub average_item_power: f64,
    #[serde(rename = "Equipment", default, deserialize_with = "null_as_default")]
    pub equipment: Equipment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(rename = "MainHand", default, deserialize_with = "null_as_default")]
    pub main_hand: Option<Item>,
    #[serde(rename = "Head", default, deserialize_with = "null_as_default")]
    pub head: Option<Item>,
    #[serde(rename = "Armor", default, deserialize_with = "null_as_default")]
    pub armor: Option<Item>,
    #[serde(rename = "Shoes", default, deserialize_with = "null_as_default")]
    pub shoes: Option<Item>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "Type", default, deserialize_with = "null_as_default")]
    pub item_type: Option<String>,
}

/// The feed sends explicit `null` for absent objects; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Result of a completed match from one team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
        }
    }
}

/// Canonical, order-independent identity of a set of player names.
pub fn team_key<S: AsRef<str>>(names: &[S]) -> String {
    sorted_names(names).join(",")
}

pub fn sorted_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut sorted: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
    sorted.sort();
    sorted.dedup();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_feed_shape() {
        let raw = r#"{
            "EventId": 42,
            "TimeStamp": "2024-05-01T12:00:00.000Z",
            "Killer": {"Name": "Alice", "AverageItemPower": 1050.2,
                       "Equipment": {"MainHand": {"Type": "T4_MAIN_SWORD@1"}, "Head": null}},
            "Victim": {"Name": "Eve", "AverageItemPower": 990.0},
            "Participants": [{"Name": "Alice", "AverageItemPower": 1050.2}],
            "GroupMembers": [{"Name": "Alice"}, {"Name": "Bob"}],
            "groupMemberCount": 2,
            "numberOfParticipants": 1
        }"#;

        let event: KillEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_id, 42);
        assert_eq!(event.killer.name, "Alice");
        assert_eq!(
            event.killer.equipment.main_hand.as_ref().unwrap().item_type.as_deref(),
            Some("T4_MAIN_SWORD@1")
        );
        assert!(event.killer.equipment.head.is_none());
        assert_eq!(event.group_member_names(), vec!["Alice", "Bob"]);
        assert_eq!(event.group_member_count, 2);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let event: KillEvent =
            serde_json::from_str(r#"{"EventId": 7, "Killer": null, "Participants": null}"#).unwrap();
        assert_eq!(event.event_id, 7);
        assert!(event.timestamp.is_empty());
        assert!(event.participants.is_empty());
        assert_eq!(event.victim.average_item_power, 0.0);
        assert!(!event.is_in_group_kill());
    }

    #[test]
    fn test_team_key_is_order_independent() {
        assert_eq!(team_key(&["Bob", "Alice"]), team_key(&["Alice", "Bob"]));
        assert_eq!(team_key(&["Bob", "Alice"]), "Alice,Bob");
    }
}
