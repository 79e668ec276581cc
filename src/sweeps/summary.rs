//! Periodic activity summary
//!
//! Ranks the teams with the most recorded matches inside the trailing window
//! and reports their win rate and how long ago they last played.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::ModeConfig;
use crate::models::Outcome;
use crate::sweeps::history::{HistoryAggregator, HistoryEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct TeamStanding {
    /// Comma-joined sorted member names.
    pub team: String,
    pub wins: usize,
    pub total: usize,
    pub last_match_at: DateTime<Utc>,
    pub since_last_match: chrono::Duration,
}

impl TeamStanding {
    fn from_entries(team: &str, entries: &[HistoryEntry], now: DateTime<Utc>) -> Option<Self> {
        let last_match_at = entries.iter().map(|e| e.recorded_at).max()?;
        Some(Self {
            team: team.to_string(),
            wins: entries.iter().filter(|e| e.outcome == Outcome::Win).count(),
            total: entries.len(),
            last_match_at,
            since_last_match: now - last_match_at,
        })
    }

    /// Rounded half to even, so 1/8 reads 12% and 5/8 reads 62%.
    pub fn win_rate_pct(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.wins as f64 * 100.0 / self.total as f64).round_ties_even() as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeSummary {
    pub mode: String,
    pub window: Duration,
    pub unique_teams: usize,
    pub top_teams: Vec<TeamStanding>,
}

impl ModeSummary {
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "🌀 **{} Hellgate Summary** (last {} min)",
                self.mode.to_uppercase(),
                self.window.as_secs() / 60
            ),
            format!("🔢 Unique Teams: {}", self.unique_teams),
        ];

        for standing in &self.top_teams {
            let elapsed = standing.since_last_match.num_seconds().max(0);
            lines.push(format!(
                "🛡️ {} — {}/{} wins ({}%) — Last match: {}m {}s ago",
                standing.team,
                standing.wins,
                standing.total,
                standing.win_rate_pct(),
                elapsed / 60,
                elapsed % 60
            ));
        }

        lines.join("\n")
    }
}

pub struct SummaryReporter {
    window: Duration,
    top_k: usize,
}

impl SummaryReporter {
    pub fn new(window: Duration, top_k: usize) -> Self {
        Self { window, top_k }
    }

    /// Prune then rank every mode. Modes without history still get a summary.
    pub fn summarize(
        &self,
        history: &mut HistoryAggregator,
        modes: &[ModeConfig],
        now: DateTime<Utc>,
    ) -> Vec<ModeSummary> {
        modes
            .iter()
            .map(|mode| self.summarize_mode(history, &mode.name, now))
            .collect()
    }

    pub fn summarize_mode(
        &self,
        history: &mut HistoryAggregator,
        mode: &str,
        now: DateTime<Utc>,
    ) -> ModeSummary {
        history.prune(mode, now, self.window);

        let mut standings: Vec<TeamStanding> = history
            .teams(mode)
            .map(|teams| {
                teams
                    .iter()
                    .filter_map(|(team, entries)| TeamStanding::from_entries(team, entries, now))
                    .collect()
            })
            .unwrap_or_default();

        let unique_teams = standings.len();
        standings.sort_by(rank_order);
        standings.truncate(self.top_k);

        ModeSummary {
            mode: mode.to_string(),
            window: self.window,
            unique_teams,
            top_teams: standings,
        }
    }
}

/// Most matches first, then most recent, then team name.
fn rank_order(a: &TeamStanding, b: &TeamStanding) -> Ordering {
    b.total
        .cmp(&a.total)
        .then_with(|| b.last_match_at.cmp(&a.last_match_at))
        .then_with(|| a.team.cmp(&b.team))
}
