//! Feed engine configuration
//!
//! Loads tunables from environment variables (and a `.env` file if present).
//! Every field has a default, so an empty environment yields a usable config.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Feed synchronization settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Seconds between periodic prune ticks (0 disables the ticker)
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Number of discrete levels the time projector maps onto
    #[serde(default = "default_progress_levels")]
    pub progress_levels: u32,
    /// Maximum distinct emojis shown per moment
    #[serde(default = "default_reaction_display_cap")]
    pub reaction_display_cap: usize,
    /// Deadline for one bulk fetch, unbounded when unset
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
    /// Reject bulk results that are not sorted newest-first
    #[serde(default = "default_verify_base_order")]
    pub verify_base_order: bool,
    /// How many pruned ids are remembered to block resurrection
    #[serde(default = "default_tombstone_capacity")]
    pub tombstone_capacity: usize,
    /// Capacity of the engine's command queue
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            prune_interval_secs: default_prune_interval_secs(),
            progress_levels: default_progress_levels(),
            reaction_display_cap: default_reaction_display_cap(),
            fetch_timeout_ms: None,
            verify_base_order: default_verify_base_order(),
            tombstone_capacity: default_tombstone_capacity(),
            command_buffer: default_command_buffer(),
        }
    }
}

// Default value functions
fn default_prune_interval_secs() -> u64 {
    60
}

fn default_progress_levels() -> u32 {
    6
}

fn default_reaction_display_cap() -> usize {
    4
}

fn default_verify_base_order() -> bool {
    cfg!(debug_assertions)
}

fn default_tombstone_capacity() -> usize {
    1024
}

fn default_command_buffer() -> usize {
    64
}

impl FeedConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self::from_lookup(|key| env::var(key).ok())?;
        tracing::debug!(?config, "Feed configuration loaded");
        Ok(config)
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            prune_interval_secs: parse_var(&lookup, "FEED_PRUNE_INTERVAL_SECS")?
                .unwrap_or(defaults.prune_interval_secs),
            progress_levels: parse_var(&lookup, "FEED_PROGRESS_LEVELS")?
                .unwrap_or(defaults.progress_levels),
            reaction_display_cap: parse_var(&lookup, "FEED_REACTION_DISPLAY_CAP")?
                .unwrap_or(defaults.reaction_display_cap),
            fetch_timeout_ms: parse_var(&lookup, "FEED_FETCH_TIMEOUT_MS")?,
            verify_base_order: parse_var(&lookup, "FEED_VERIFY_BASE_ORDER")?
                .unwrap_or(defaults.verify_base_order),
            tombstone_capacity: parse_var(&lookup, "FEED_TOMBSTONE_CAPACITY")?
                .unwrap_or(defaults.tombstone_capacity),
            command_buffer: match parse_var::<_, usize>(&lookup, "FEED_COMMAND_BUFFER")? {
                Some(0) => {
                    return Err(ConfigError::InvalidValue(
                        "FEED_COMMAND_BUFFER",
                        "must be greater than zero".to_string(),
                    ))
                }
                Some(n) => n,
                None => defaults.command_buffer,
            },
        })
    }

    /// Interval between periodic prunes, `None` when disabled
    #[must_use]
    pub fn prune_interval(&self) -> Option<Duration> {
        if self.prune_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.prune_interval_secs))
        }
    }

    /// Deadline wrapped around each bulk fetch
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
