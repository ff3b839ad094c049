//! Application configuration management.
//!
//! Configuration is stored at `~/.config/roadeye/config.json`. Missing keys
//! take their defaults, and `ROADEYE_API_BASE_URL` / `ROADEYE_API_TOKEN`
//! override the file when set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::{DEFAULT_API_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::store::{StalePolicy, StoreOptions, DEFAULT_CACHE_TTL_SECS};
use crate::sync::{
    SyncOptions, DEFAULT_ALERTS_RADIUS_KM, DEFAULT_MAP_RADIUS_KM, DEFAULT_REFRESH_INTERVAL_SECS,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "roadeye";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_BASE_URL: &str = "ROADEYE_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "ROADEYE_API_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub cache_ttl_secs: i64,
    pub refresh_interval_secs: u64,
    pub map_radius_km: f64,
    pub alerts_radius_km: f64,
    pub request_timeout_secs: u64,
    pub stale_policy: StalePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            map_radius_km: DEFAULT_MAP_RADIUS_KM,
            alerts_radius_km: DEFAULT_ALERTS_RADIUS_KM,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            stale_policy: StalePolicy::default(),
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            debug!(path = %path.display(), "Loaded config");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cache_ttl: chrono::Duration::seconds(self.cache_ttl_secs),
            stale_policy: self.stale_policy,
            ..StoreOptions::default()
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            map_radius_km: self.map_radius_km,
            alerts_radius_km: self.alerts_radius_km,
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("roadeye-config-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from(&temp_path("missing")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"api_base_url":"http://localhost:8080","stale_policy":"discard_superseded"}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.stale_policy, StalePolicy::DiscardSuperseded);
        assert_eq!(config.map_radius_km, 5.0);
        assert_eq!(config.alerts_radius_km, 10.0);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_path("save");
        let config = Config {
            api_token: Some("secret".to_string()),
            cache_ttl_secs: 60,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = temp_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            ENV_API_BASE_URL => Some("https://staging.example.com".to_string()),
            ENV_API_TOKEN => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://staging.example.com");
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn test_derived_options() {
        let config = Config {
            cache_ttl_secs: 120,
            refresh_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.store_options().cache_ttl, chrono::Duration::seconds(120));
        assert_eq!(config.sync_options().refresh_interval, Duration::from_secs(1));
        assert_eq!(config.sync_options().map_radius_km, 5.0);
    }
}
