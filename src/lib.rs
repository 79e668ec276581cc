//! Sweepwatch Library
//!
//! Detects Hellgate clean sweeps in the gameinfo kill feed: dedups polled
//! events, tracks matches per mode, announces wins and keeps a rolling
//! per-team record for periodic summaries.

pub mod config;
pub mod delivery;
pub mod models;
pub mod scrapers;
pub mod sweeps;

pub use config::{Config, ModeConfig};
pub use models::{KillEvent, Outcome};
