pub mod feed_health;
pub mod gameinfo;

pub use feed_health::FeedHealth;
pub use gameinfo::{parse_events, GameInfoClient};
