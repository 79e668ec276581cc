//! Discord REST delivery.
//!
//! Posts plain `content` messages with a bot token; no gateway connection.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

use super::{MessageSink, SendOutcome};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
/// Discord rejects message content above this length.
pub const MAX_CONTENT_LEN: usize = 2000;

pub struct DiscordSink {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordSink {
    pub fn new(token: String) -> Result<Self> {
        Self::with_api_base(token, DISCORD_API_BASE)
    }

    pub fn with_api_base(token: String, api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("DiscordBot (sweepwatch, 0.1)")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.into(),
            token,
        })
    }

    fn message_url(&self, channel_id: u64) -> String {
        format!(
            "{}/channels/{}/messages",
            self.api_base.trim_end_matches('/'),
            channel_id
        )
    }
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send(&self, channel_id: u64, text: &str) -> SendOutcome {
        let content = truncate_content(text);
        let response = self
            .client
            .post(self.message_url(channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": content }))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return SendOutcome::Failed(format!("request failed: {e}")),
        };

        let status = response.status();
        if status.is_success() {
            debug!(channel = channel_id, "message delivered");
            return SendOutcome::Delivered;
        }
        if status == StatusCode::FORBIDDEN {
            return SendOutcome::Forbidden;
        }

        let body = response.text().await.unwrap_or_default();
        SendOutcome::Failed(format!("API error {}: {}", status, body))
    }
}

fn truncate_content(text: &str) -> &str {
    if text.len() <= MAX_CONTENT_LEN {
        return text;
    }
    let mut end = MAX_CONTENT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
