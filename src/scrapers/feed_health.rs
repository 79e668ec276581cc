//! Feed health tracking
//!
//! Consecutive failures and a rolling p95 of fetch latency. Purely
//! observational: the poll cycle keeps running no matter what this reports.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{info, warn};

const MIN_LATENCY_SAMPLES: usize = 20;
const LATENCY_WINDOW: usize = 64;

pub struct FeedHealth {
    name: &'static str,
    failure_threshold: u32,
    latency_threshold_ms: f64,
    consecutive_failures: u32,
    degraded: bool,
    latency_warned: bool,
    latencies_ms: VecDeque<f64>,
}

impl FeedHealth {
    pub fn new(name: &'static str, failure_threshold: u32, latency_threshold: Duration) -> Self {
        Self {
            name,
            failure_threshold: failure_threshold.max(1),
            latency_threshold_ms: latency_threshold.as_secs_f64() * 1000.0,
            consecutive_failures: 0,
            degraded: false,
            latency_warned: false,
            latencies_ms: VecDeque::with_capacity(LATENCY_WINDOW),
        }
    }

    pub fn record_success(&mut self, latency: Duration) {
        if self.degraded {
            info!(
                source = self.name,
                failures = self.consecutive_failures,
                "✅ Feed recovered"
            );
        }
        self.consecutive_failures = 0;
        self.degraded = false;

        self.latencies_ms.push_back(latency.as_secs_f64() * 1000.0);
        if self.latencies_ms.len() > LATENCY_WINDOW {
            self.latencies_ms.pop_front();
        }

        match self.p95_latency() {
            Some(p95) if p95 > self.latency_threshold_ms => {
                if !self.latency_warned {
                    warn!(
                        source = self.name,
                        "🐢 Feed latency p95 {:.1}ms above {:.1}ms",
                        p95,
                        self.latency_threshold_ms
                    );
                    self.latency_warned = true;
                }
            }
            _ => self.latency_warned = false,
        }
    }

    pub fn record_failure(&mut self, reason: &str) {
        self.consecutive_failures += 1;
        warn!(
            source = self.name,
            failures = self.consecutive_failures,
            reason,
            "⚠️ Feed fetch failed"
        );
        if !self.degraded && self.consecutive_failures >= self.failure_threshold {
            self.degraded = true;
            warn!(
                source = self.name,
                "🛑 Feed degraded after {} consecutive failures, still polling",
                self.consecutive_failures
            );
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn p95_latency(&self) -> Option<f64> {
        if self.latencies_ms.len() < MIN_LATENCY_SAMPLES {
            return None;
        }
        let mut samples: Vec<f64> = self.latencies_ms.iter().copied().collect();
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let index = ((samples.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
        samples.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrades_after_threshold_and_recovers() {
        let mut health = FeedHealth::new("gameinfo", 3, Duration::from_secs(5));
        health.record_failure("timeout");
        health.record_failure("timeout");
        assert!(!health.is_degraded());
        health.record_failure("503");
        assert!(health.is_degraded());
        assert_eq!(health.consecutive_failures(), 3);

        health.record_success(Duration::from_millis(120));
        assert!(!health.is_degraded());
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[test]
    fn test_p95_needs_enough_samples() {
        let mut health = FeedHealth::new("gameinfo", 3, Duration::from_secs(5));
        for _ in 0..(MIN_LATENCY_SAMPLES - 1) {
            health.record_success(Duration::from_millis(100));
        }
        assert!(health.p95_latency().is_none());

        health.record_success(Duration::from_millis(100));
        let p95 = health.p95_latency().unwrap();
        assert!((p95 - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut health = FeedHealth::new("gameinfo", 3, Duration::from_secs(5));
        for i in 0..200 {
            health.record_success(Duration::from_millis(i));
        }
        assert_eq!(health.latencies_ms.len(), LATENCY_WINDOW);
    }
}
