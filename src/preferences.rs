//! Preference manager that merges config.toml defaults with DB overrides.
//!
//! Config values serve as defaults; DB values (user_preferences table) override them.
//! Writes always go to the DB, never to the config file.
use std::collections::HashMap;

use anyhow::Result;

use crate::config::Config;
use crate::storage::Database;
use crate::sync::ReadFilter;

/// Key holding the read filter the user last chose.
pub const READ_FILTER_KEY: &str = "view.read_filter";

// ============================================================================
// PreferenceManager
// ============================================================================

/// Merged preference store: config.toml defaults + DB overrides.
///
/// Reads are in-memory. Writes persist to the DB first and only then update
/// the in-memory map.
#[derive(Debug)]
pub struct PreferenceManager {
    prefs: HashMap<String, String>,
}

impl PreferenceManager {
    pub async fn load(config: &Config, db: &Database) -> Result<Self> {
        let mut prefs = Self::flatten_config(config);

        for (key, value) in db.get_preferences_by_prefix("").await? {
            prefs.insert(key, value);
        }

        Ok(Self { prefs })
    }

    /// Config only, for when the DB could not be loaded.
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefs: Self::flatten_config(config),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.prefs.get(key).map(String::as_str)
    }

    pub async fn set(&mut self, db: &Database, key: &str, value: &str) -> Result<()> {
        db.set_preference(key, value).await?;
        self.prefs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    // ========================================================================
    // Type-safe Accessors
    // ========================================================================

    /// Read filter for the first view. Unparseable values fall back to unread-only.
    pub fn read_filter(&self) -> ReadFilter {
        match self.get(READ_FILTER_KEY).map(str::parse::<ReadFilter>) {
            Some(Ok(filter)) => filter,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Ignoring stored read filter");
                ReadFilter::default()
            }
            None => ReadFilter::default(),
        }
    }

    pub async fn set_read_filter(&mut self, db: &Database, filter: ReadFilter) -> Result<()> {
        self.set(db, READ_FILTER_KEY, filter.as_str()).await
    }

    fn flatten_config(config: &Config) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("server_url".to_string(), config.server_url.clone());
        map.insert(
            READ_FILTER_KEY.to_string(),
            config.default_read_filter.clone(),
        );
        map
    }
}

// ============================================================================
// Tests
// ============================================================================
