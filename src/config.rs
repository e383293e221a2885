// ⚙️ Hub configuration, read from the environment
//
//   HUB_DATABASE_PATH        SQLite file (default: hub.db)
//   HUB_BIND_ADDR            listen address (default: 0.0.0.0:8000)
//   HUB_API_KEY              required X-API-Key value (unset = open API)
//   HUB_UNLOCK_DEFAULT_DAYS  unlock horizon when approval omits one (default: 7)
//   HUB_MAX_ERROR_DETAILS    cap on error entries in a SyncResult (default: 100)

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_UNLOCK_DAYS: i64 = 7;
pub const MAX_UNLOCK_DAYS: i64 = 90;
pub const DEFAULT_MAX_ERROR_DETAILS: usize = 100;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub api_key: Option<String>,
    pub unlock_default_days: i64,
    pub max_error_details: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            database_path: PathBuf::from("hub.db"),
            bind_addr: "0.0.0.0:8000".to_string(),
            api_key: None,
            unlock_default_days: DEFAULT_UNLOCK_DAYS,
            max_error_details: DEFAULT_MAX_ERROR_DETAILS,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. `from_env` is the process-level
    /// entry point; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = HubConfig::default();

        let unlock_default_days = match lookup("HUB_UNLOCK_DEFAULT_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("HUB_UNLOCK_DEFAULT_DAYS is not a number: {raw}"))?,
            None => defaults.unlock_default_days,
        };
        if !(1..=MAX_UNLOCK_DAYS).contains(&unlock_default_days) {
            anyhow::bail!(
                "HUB_UNLOCK_DEFAULT_DAYS must be between 1 and {MAX_UNLOCK_DAYS}, \
                 got {unlock_default_days}"
            );
        }

        let max_error_details = match lookup("HUB_MAX_ERROR_DETAILS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("HUB_MAX_ERROR_DETAILS is not a number: {raw}"))?,
            None => defaults.max_error_details,
        };

        Ok(HubConfig {
            database_path: lookup("HUB_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            bind_addr: lookup("HUB_BIND_ADDR").unwrap_or(defaults.bind_addr),
            api_key: lookup("HUB_API_KEY").filter(|k| !k.trim().is_empty()),
            unlock_default_days,
            max_error_details,
        })
    }
}
