//! Message delivery
//!
//! Announcements are fire-and-forget: a failed send is logged with its
//! channel and never retried.

pub mod discord;

use async_trait::async_trait;
use tracing::{info, warn};

pub use discord::DiscordSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Forbidden,
    Failed(String),
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, channel_id: u64, text: &str) -> SendOutcome;
}

/// Send and log the outcome. Returns true when delivered.
pub async fn deliver(sink: &dyn MessageSink, channel_id: u64, context: &str, text: &str) -> bool {
    match sink.send(channel_id, text).await {
        SendOutcome::Delivered => true,
        SendOutcome::Forbidden => {
            warn!(
                channel = channel_id,
                context, "❌ Forbidden: missing permission to post in channel"
            );
            false
        }
        SendOutcome::Failed(reason) => {
            warn!(channel = channel_id, context, reason = %reason, "❌ Error sending message");
            false
        }
    }
}

/// Dry-run sink: writes messages to the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, channel_id: u64, text: &str) -> SendOutcome {
        info!(channel = channel_id, "📨 [dry-run]\n{}", text);
        SendOutcome::Delivered
    }
}
