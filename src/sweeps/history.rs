//! Rolling win/loss log per mode and team.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::Outcome;
use crate::sweeps::tracker::MatchWin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub team: String,
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
}

/// Team key -> entries in recording order.
pub type TeamHistory = BTreeMap<String, Vec<HistoryEntry>>;

#[derive(Debug, Default)]
pub struct HistoryAggregator {
    modes: HashMap<String, TeamHistory>,
}

impl HistoryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mode: &str, team_key: &str, outcome: Outcome, at: DateTime<Utc>) {
        self.modes
            .entry(mode.to_string())
            .or_default()
            .entry(team_key.to_string())
            .or_default()
            .push(HistoryEntry {
                team: team_key.to_string(),
                outcome,
                recorded_at: at,
            });
    }

    /// Win for the sweeping team, loss for the players it swept.
    pub fn record_win(&mut self, win: &MatchWin) {
        for (team, outcome) in win.outcomes() {
            self.record(&win.mode, &team, outcome, win.completed_at);
        }
    }

    /// Drop entries older than `window` and teams left with nothing.
    pub fn prune(&mut self, mode: &str, now: DateTime<Utc>, window: Duration) -> usize {
        let Some(teams) = self.modes.get_mut(mode) else {
            return 0;
        };
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);

        let mut removed = 0;
        teams.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| now - e.recorded_at <= window);
            removed += before - entries.len();
            !entries.is_empty()
        });

        if removed > 0 {
            debug!(mode, removed, teams = teams.len(), "pruned match history");
        }
        removed
    }

    pub fn teams(&self, mode: &str) -> Option<&TeamHistory> {
        self.modes.get(mode)
    }

    pub fn team_count(&self, mode: &str) -> usize {
        self.modes.get(mode).map_or(0, |t| t.len())
    }
}
