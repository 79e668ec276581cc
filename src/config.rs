//! Sweepwatch configuration
//!
//! Globals come from the environment (`.env` is loaded first). The mode
//! table defaults to 2v2/5v5 and can be replaced by a TOML file.

use std::{collections::HashSet, env, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::KillEvent;

pub const DEFAULT_GAMEINFO_API_URL: &str =
    "https://gameinfo-sgp.albiononline.com/api/gameinfo/events";

/// A named match configuration, e.g. "2v2".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub name: String,
    /// Required group size, also the cap on participants per event.
    pub team_size: usize,
    /// Exclusive item power band for the victim and every participant.
    pub item_power_min: f64,
    pub item_power_max: f64,
    pub required_kills: usize,
    /// Destination channel for win announcements.
    #[serde(default)]
    pub channel_id: u64,
}

impl ModeConfig {
    pub fn two_vs_two(channel_id: u64) -> Self {
        Self {
            name: "2v2".into(),
            team_size: 2,
            item_power_min: 900.0,
            item_power_max: 1200.0,
            required_kills: 2,
            channel_id,
        }
    }

    pub fn five_vs_five(channel_id: u64) -> Self {
        Self {
            name: "5v5".into(),
            team_size: 5,
            item_power_min: 1000.0,
            item_power_max: 1300.0,
            required_kills: 5,
            channel_id,
        }
    }

    #[inline]
    pub fn in_band(&self, item_power: f64) -> bool {
        self.item_power_min < item_power && item_power < self.item_power_max
    }

    /// Eligibility filter applied before an event reaches this mode's tracker.
    pub fn accepts(&self, event: &KillEvent) -> bool {
        event.group_member_count == self.team_size
            && event.number_of_participants <= self.team_size
            && self.in_band(event.victim.average_item_power)
            && event
                .participants
                .iter()
                .all(|p| self.in_band(p.average_item_power))
    }

    pub fn label(&self) -> String {
        self.name.to_uppercase()
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: Option<String>,
    pub summary_channel_id: u64,
    pub api_url: String,
    pub poll_interval: Duration,
    pub fetch_limit: usize,
    pub fetch_timeout: Duration,
    pub base_match_timeout: Duration,
    pub kill_timeout_extension: Duration,
    pub seen_retention: Duration,
    pub summary_interval: Duration,
    pub summary_window: Duration,
    pub summary_top_k: usize,
    pub modes: Vec<ModeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: None,
            summary_channel_id: 0,
            api_url: DEFAULT_GAMEINFO_API_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            fetch_limit: 51,
            fetch_timeout: Duration::from_secs(10),
            base_match_timeout: Duration::from_secs(150),
            kill_timeout_extension: Duration::from_secs(30),
            seen_retention: Duration::from_secs(900),
            summary_interval: Duration::from_secs(600),
            summary_window: Duration::from_secs(4800),
            summary_top_k: 5,
            modes: vec![ModeConfig::two_vs_two(0), ModeConfig::five_vs_five(0)],
        }
    }
}

/// TOML overlay. Every field is optional; `modes` replaces the whole table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub summary_channel_id: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub fetch_limit: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub match_timeout_secs: Option<u64>,
    pub kill_timeout_extension_secs: Option<u64>,
    pub seen_retention_secs: Option<u64>,
    pub summary_interval_secs: Option<u64>,
    pub summary_window_secs: Option<u64>,
    pub summary_top_k: Option<usize>,
    #[serde(default)]
    pub modes: Vec<ModeConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let discord_token = env::var("DISCORD_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let channel_2v2 = env_parse("CHANNEL_ID", 0u64)?;
        let channel_5v5 = env_parse("CHANNEL_5V5_ID", 0u64)?;
        let summary_channel_id = env_parse("CHANNEL_SUMMARY_ID", 0u64)?;

        let api_url = env::var("GAMEINFO_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.api_url);

        Ok(Self {
            discord_token,
            summary_channel_id,
            api_url,
            poll_interval: env_secs("POLL_INTERVAL_SECS", defaults.poll_interval)?,
            fetch_limit: env_parse("FETCH_LIMIT", defaults.fetch_limit)?,
            fetch_timeout: env_secs("FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            base_match_timeout: env_secs("MATCH_TIMEOUT_SECS", defaults.base_match_timeout)?,
            kill_timeout_extension: env_secs(
                "KILL_TIMEOUT_EXTENSION_SECS",
                defaults.kill_timeout_extension,
            )?,
            seen_retention: env_secs("SEEN_RETENTION_SECS", defaults.seen_retention)?,
            summary_interval: env_secs("SUMMARY_INTERVAL_SECS", defaults.summary_interval)?,
            summary_window: env_secs("SUMMARY_WINDOW_SECS", defaults.summary_window)?,
            summary_top_k: env_parse("SUMMARY_TOP_K", defaults.summary_top_k)?,
            modes: vec![
                ModeConfig::two_vs_two(channel_2v2),
                ModeConfig::five_vs_five(channel_5v5),
            ],
        })
    }

    pub fn load_file(path: &Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(v) = file.api_url {
            self.api_url = v;
        }
        if let Some(v) = file.summary_channel_id {
            self.summary_channel_id = v;
        }
        if let Some(v) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.fetch_limit {
            self.fetch_limit = v;
        }
        if let Some(v) = file.fetch_timeout_secs {
            self.fetch_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.match_timeout_secs {
            self.base_match_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.kill_timeout_extension_secs {
            self.kill_timeout_extension = Duration::from_secs(v);
        }
        if let Some(v) = file.seen_retention_secs {
            self.seen_retention = Duration::from_secs(v);
        }
        if let Some(v) = file.summary_interval_secs {
            self.summary_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.summary_window_secs {
            self.summary_window = Duration::from_secs(v);
        }
        if let Some(v) = file.summary_top_k {
            self.summary_top_k = v;
        }
        if !file.modes.is_empty() {
            self.modes = file.modes;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            bail!("at least one mode must be configured");
        }

        let mut names = HashSet::with_capacity(self.modes.len());
        for mode in &self.modes {
            if !names.insert(mode.name.as_str()) {
                bail!("duplicate mode name '{}'", mode.name);
            }
            if mode.team_size == 0 {
                bail!("mode '{}': team_size must be > 0", mode.name);
            }
            if mode.required_kills == 0 {
                bail!("mode '{}': required_kills must be > 0", mode.name);
            }
            if !(mode.item_power_min < mode.item_power_max) {
                bail!(
                    "mode '{}': item power band ({}, {}) is empty",
                    mode.name,
                    mode.item_power_min,
                    mode.item_power_max
                );
            }
        }

        if self.poll_interval.is_zero() || self.summary_interval.is_zero() {
            bail!("poll and summary intervals must be > 0");
        }
        if self.fetch_limit == 0 {
            bail!("fetch_limit must be > 0");
        }
        if self.summary_top_k == 0 {
            bail!("summary_top_k must be > 0");
        }

        let base = chrono_duration("match timeout", self.base_match_timeout)?;
        let extension = chrono_duration("kill timeout extension", self.kill_timeout_extension)?;
        chrono_duration("seen retention", self.seen_retention)?;
        chrono_duration("summary window", self.summary_window)?;

        // A match can earn one extension per required kill before it completes.
        let most_kills = self.modes.iter().map(|m| m.required_kills).max().unwrap_or(0);
        let budget = i32::try_from(most_kills)
            .ok()
            .and_then(|kills| extension.checked_mul(kills))
            .and_then(|earned| base.checked_add(&earned));
        if budget.is_none() {
            bail!("match timeout plus {most_kills} kill extensions does not fit in a duration");
        }

        if self.seen_retention < self.poll_interval {
            bail!(
                "seen retention ({:?}) must cover at least one poll interval ({:?})",
                self.seen_retention,
                self.poll_interval
            );
        }

        Ok(())
    }

    /// Live delivery needs a real channel for every mode and the summary.
    pub fn validate_channels(&self) -> Result<()> {
        if let Some(mode) = self.modes.iter().find(|m| m.channel_id == 0) {
            bail!("mode '{}' has no channel id configured", mode.name);
        }
        if self.summary_channel_id == 0 {
            bail!("CHANNEL_SUMMARY_ID is not configured");
        }
        Ok(())
    }
}

fn chrono_duration(label: &str, d: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(d).with_context(|| format!("{label} ({d:?}) is out of range"))
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {key}={raw}: {e}")),
        _ => Ok(default),
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration> {
    env_parse(key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Combatant;
    use std::io::Write;

    fn combatant(name: &str, ip: f64) -> Combatant {
        Combatant {
            name: name.into(),
            average_item_power: ip,
            ..Default::default()
        }
    }

    fn event(group: usize, participants: Vec<Combatant>, victim_ip: f64) -> KillEvent {
        KillEvent {
            event_id: 1,
            group_member_count: group,
            number_of_participants: participants.len(),
            participants,
            victim: combatant("Eve", victim_ip),
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_accepts_in_band_event() {
        let mode = ModeConfig::two_vs_two(1);
        let e = event(2, vec![combatant("Alice", 1000.0), combatant("Bob", 1100.0)], 950.0);
        assert!(mode.accepts(&e));
    }

    #[test]
    fn test_mode_band_is_exclusive() {
        let mode = ModeConfig::two_vs_two(1);
        assert!(!mode.in_band(900.0));
        assert!(!mode.in_band(1200.0));
        assert!(mode.in_band(900.5));
    }

    #[test]
    fn test_mode_rejects_wrong_group_or_outsiders() {
        let mode = ModeConfig::two_vs_two(1);
        let wrong_group = event(5, vec![combatant("Alice", 1000.0)], 950.0);
        assert!(!mode.accepts(&wrong_group));

        let mut outsiders = event(2, vec![combatant("Alice", 1000.0)], 950.0);
        outsiders.number_of_participants = 3;
        assert!(!mode.accepts(&outsiders));

        let over_geared = event(2, vec![combatant("Alice", 1250.0)], 950.0);
        assert!(!mode.accepts(&over_geared));

        let victim_out = event(2, vec![combatant("Alice", 1000.0)], 0.0);
        assert!(!mode.accepts(&victim_out));
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_validate_channels_requires_ids() {
        let mut config = Config::default();
        assert!(config.validate_channels().is_err());

        config.modes = vec![ModeConfig::two_vs_two(10), ModeConfig::five_vs_five(11)];
        assert!(config.validate_channels().is_err());

        config.summary_channel_id = 12;
        config.validate_channels().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_modes() {
        let mut config = Config::default();
        config.modes.push(ModeConfig::two_vs_two(3));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.modes[0].item_power_min = 1300.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.modes[1].required_kills = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.seen_retention = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_durations() {
        let huge = Duration::from_secs(10_000_000_000_000_000);

        let mut config = Config::default();
        config.base_match_timeout = huge;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.summary_window = huge;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.seen_retention = huge;
        assert!(config.validate().is_err());

        // Each fits alone, but not once the kill extensions are added.
        let mut config = Config::default();
        config.base_match_timeout = Duration::from_secs(5_000_000_000_000_000);
        config.kill_timeout_extension = Duration::from_secs(1_000_000_000_000_000);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.base_match_timeout = Duration::from_secs(86_400 * 365);
        config.validate().unwrap();
    }

    #[test]
    fn test_toml_overlay_replaces_modes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
summary_top_k = 3
match_timeout_secs = 200

[[modes]]
name = "3v3"
team_size = 3
item_power_min = 1100.0
item_power_max = 1400.0
required_kills = 3
channel_id = 99
"#
        )
        .unwrap();

        let overlay = Config::load_file(file.path()).unwrap();
        let config = Config::default().apply_file(overlay);
        config.validate().unwrap();

        assert_eq!(config.summary_top_k, 3);
        assert_eq!(config.base_match_timeout, Duration::from_secs(200));
        assert_eq!(config.modes.len(), 1);
        assert_eq!(config.modes[0].name, "3v3");
        assert_eq!(config.modes[0].channel_id, 99);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_toml_overlay_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pol_interval_secs = 3").unwrap();
        assert!(Config::load_file(file.path()).is_err());
    }
}
