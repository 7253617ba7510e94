//! Configuration file parser for ~/.config/feedsync/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::sync::{PagerSettings, ReadFilter, SyncSettings};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the aggregation server.
    pub server_url: String,

    /// Items per page for entry lists.
    pub page_size: usize,

    /// Items per page for the daily digest.
    pub daily_page_size: usize,

    /// A page with this many items or fewer ends the collection (0 = only empty pages).
    pub exhaust_threshold: usize,

    /// Fraction of the list height an entry's bottom must scroll past to count as read.
    pub read_threshold: f32,

    /// Sidebar poll period in seconds.
    pub poll_interval_secs: u64,

    /// Unread badge refresh period in seconds.
    pub badge_interval_secs: u64,

    pub request_timeout_secs: u64,

    /// "unread" or "all". Used until a filter is chosen interactively.
    pub default_read_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            page_size: 5,
            daily_page_size: 10,
            exhaust_threshold: 2,
            read_threshold: 0.7,
            poll_interval_secs: 5,
            badge_interval_secs: 300,
            request_timeout_secs: 30,
            default_read_filter: "unread".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "server_url",
        "page_size",
        "daily_page_size",
        "exhaust_threshold",
        "read_threshold",
        "poll_interval_secs",
        "badge_interval_secs",
        "request_timeout_secs",
        "default_read_filter",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), server = %config.server_url, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.daily_page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size and daily_page_size must be at least 1".to_string(),
            ));
        }
        if !(self.read_threshold > 0.0 && self.read_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "read_threshold must be in (0, 1], got {}",
                self.read_threshold
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        self.default_read_filter
            .parse::<ReadFilter>()
            .map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// Settings handed to the sync engine.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            pager: PagerSettings {
                page_size: self.page_size,
                daily_page_size: self.daily_page_size,
                exhaust_threshold: self.exhaust_threshold,
            },
            read_threshold: self.read_threshold,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn badge_interval(&self) -> Duration {
        Duration::from_secs(self.badge_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
