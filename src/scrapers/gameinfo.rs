//! Gameinfo events feed
//!
//! GET `{api_url}?limit=N`, newest-first. Any transport error, timeout or
//! non-2xx status is logged and reported as an empty batch.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::models::KillEvent;
use crate::scrapers::feed_health::FeedHealth;

const FAILURE_WARN_THRESHOLD: u32 = 5;
const LATENCY_WARN_THRESHOLD: Duration = Duration::from_secs(3);

pub struct GameInfoClient {
    client: Client,
    api_url: String,
    health: Mutex<FeedHealth>,
}

impl GameInfoClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("sweepwatch/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            health: Mutex::new(FeedHealth::new(
                "gameinfo",
                FAILURE_WARN_THRESHOLD,
                LATENCY_WARN_THRESHOLD,
            )),
        })
    }

    /// Latest events, newest first. Empty on any failure.
    pub async fn fetch_events(&self, limit: usize) -> Vec<KillEvent> {
        let start = Instant::now();
        match self.try_fetch_events(limit).await {
            Ok(events) => {
                self.health.lock().record_success(start.elapsed());
                events
            }
            Err(e) => {
                self.health.lock().record_failure(&format!("{e:#}"));
                Vec::new()
            }
        }
    }

    pub async fn try_fetch_events(&self, limit: usize) -> Result<Vec<KillEvent>> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("limit", limit)])
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("API error {}: {}", status, text));
        }

        let body = response
            .text()
            .await
            .context("Failed to read events response")?;
        parse_events(&body)
    }
}

/// Parse a feed page, skipping individual entries that fail to decode.
pub fn parse_events(body: &str) -> Result<Vec<KillEvent>> {
    let raw: Vec<Value> = serde_json::from_str(body).context("Failed to parse events response")?;
    let total = raw.len();

    let events: Vec<KillEvent> = raw
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<KillEvent>(v) {
            Ok(e) => Some(e),
            Err(e) => {
                debug!(error = %e, "skipping undecodable event");
                None
            }
        })
        .collect();

    if events.len() < total {
        debug!(
            skipped = total - events.len(),
            total, "some events in the page could not be decoded"
        );
    }

    Ok(events)
}
