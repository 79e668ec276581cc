//! Sweep detection engine
//!
//! - `dedup`: drops feed re-deliveries, yields events oldest-first
//! - `tracker`: per-mode match state and win detection
//! - `history`: rolling win/loss log per team
//! - `summary`: ranked activity report
//! - `pipeline`: wires the above into one poll cycle

pub mod dedup;
pub mod equipment;
pub mod history;
pub mod pipeline;
pub mod summary;
pub mod tracker;

pub use dedup::{EventDeduplicator, SeenRecord};
pub use equipment::{normalize_item_name, EquipmentBook, GearSnapshot};
pub use history::{HistoryAggregator, HistoryEntry};
pub use pipeline::{Announcement, CycleReport, SweepPipeline};
pub use summary::{ModeSummary, SummaryReporter, TeamStanding};
pub use tracker::{ExpiredMatch, Match, MatchTracker, MatchWin, TrackerTimings, WinKey};
