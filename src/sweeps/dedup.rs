//! Event deduplication
//!
//! The feed returns overlapping, newest-first pages on every poll. This keeps a
//! time-bounded window of observed event ids and hands back only unseen events,
//! oldest first.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::KillEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenRecord {
    pub event_id: u64,
    pub observed_at: DateTime<Utc>,
}

pub struct EventDeduplicator {
    /// Ordered by observation time; front is oldest.
    seen: VecDeque<SeenRecord>,
    ids: HashSet<u64>,
    retention: chrono::Duration,
}

impl EventDeduplicator {
    pub fn new(retention: Duration) -> Self {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);

        Self {
            seen: VecDeque::with_capacity(1024),
            ids: HashSet::with_capacity(1024),
            retention,
        }
    }

    /// Filter a newest-first batch down to unseen events, returned oldest-first.
    ///
    /// Accepted ids are recorded before the events are handed downstream, so a
    /// repeat inside the same batch or a later batch is dropped.
    pub fn ingest(&mut self, batch: Vec<KillEvent>, now: DateTime<Utc>) -> Vec<KillEvent> {
        let total = batch.len();
        let mut fresh = Vec::with_capacity(total);

        for event in batch.into_iter().rev() {
            if !self.ids.insert(event.event_id) {
                continue;
            }
            self.seen.push_back(SeenRecord {
                event_id: event.event_id,
                observed_at: now,
            });
            fresh.push(event);
        }

        let evicted = self.evict(now);
        if total > 0 {
            debug!(
                batch = total,
                fresh = fresh.len(),
                evicted,
                tracked = self.seen.len(),
                "dedup pass"
            );
        }

        fresh
    }

    pub fn contains(&self, event_id: u64) -> bool {
        self.ids.contains(&event_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict(&mut self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        while let Some(front) = self.seen.front() {
            if now - front.observed_at <= self.retention {
                break;
            }
            self.ids.remove(&front.event_id);
            self.seen.pop_front();
            evicted += 1;
        }
        evicted
    }
}
