//! One poll cycle: dedup, per-mode filtering, match tracking, history, purge.
//!
//! Pure state transition; delivery of the resulting announcements is the
//! caller's job so nothing here awaits while holding state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::models::KillEvent;
use crate::sweeps::dedup::EventDeduplicator;
use crate::sweeps::equipment::EquipmentBook;
use crate::sweeps::history::HistoryAggregator;
use crate::sweeps::tracker::{MatchTracker, MatchWin, TrackerTimings};

#[derive(Debug, Clone)]
pub struct Announcement {
    pub channel_id: u64,
    pub mode: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub fresh: usize,
    pub eligible: usize,
    pub expired: usize,
    pub announcements: Vec<Announcement>,
}

pub struct SweepPipeline {
    dedup: EventDeduplicator,
    trackers: Vec<MatchTracker>,
    history: Arc<Mutex<HistoryAggregator>>,
    equipment: Arc<EquipmentBook>,
}

impl SweepPipeline {
    pub fn new(
        config: &Config,
        history: Arc<Mutex<HistoryAggregator>>,
        equipment: Arc<EquipmentBook>,
    ) -> Self {
        let timings = TrackerTimings {
            base_timeout: config.base_match_timeout,
            kill_extension: config.kill_timeout_extension,
            win_key_retention: config.summary_window,
        };
        let trackers = config
            .modes
            .iter()
            .cloned()
            .map(|mode| MatchTracker::new(mode, timings, equipment.clone()))
            .collect();

        Self {
            dedup: EventDeduplicator::new(config.seen_retention),
            trackers,
            history,
            equipment,
        }
    }

    pub fn tracker(&self, mode: &str) -> Option<&MatchTracker> {
        self.trackers.iter().find(|t| t.mode().name == mode)
    }

    /// Run one cycle over a newest-first batch.
    pub fn run_cycle(&mut self, batch: Vec<KillEvent>, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport {
            fetched: batch.len(),
            ..Default::default()
        };

        let fresh = self.dedup.ingest(batch, now);
        report.fresh = fresh.len();

        let mut wins: Vec<(u64, MatchWin)> = Vec::new();
        for event in &fresh {
            let mut matched = false;
            for tracker in self.trackers.iter_mut() {
                if !tracker.accepts(event) {
                    continue;
                }
                matched = true;
                report.eligible += 1;
                if let Some(win) = tracker.process(event, now) {
                    wins.push((tracker.mode().channel_id, win));
                }
            }
            if !matched {
                self.equipment.update_from(&event.participants);
            }
        }

        if !wins.is_empty() {
            let mut history = self.history.lock();
            for (_, win) in &wins {
                history.record_win(win);
            }
        }

        for tracker in self.trackers.iter_mut() {
            report.expired += tracker.purge(now).len();
        }

        report.announcements = wins
            .into_iter()
            .map(|(channel_id, win)| Announcement {
                channel_id,
                mode: win.mode,
                text: win.message,
            })
            .collect();

        if report.fetched > 0 {
            debug!(
                fetched = report.fetched,
                fresh = report.fresh,
                eligible = report.eligible,
                wins = report.announcements.len(),
                expired = report.expired,
                "poll cycle complete"
            );
        }

        report
    }
}
