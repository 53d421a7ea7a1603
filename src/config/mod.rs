//! # Configuration
//!
//! TOML configuration for the `cultivation` binary. Every field has a default,
//! so a partial file (or none at all, via [`Config::default`]) is valid.
//!
//! ```toml
//! [engine]
//! flee_chance = 0.7
//! adventure_min_interval_secs = 300
//! daily_reset_hours = 24
//! log_capacity = 100
//! # rng_seed = 42
//!
//! [storage]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//! file = "cultivation.log"
//!
//! [content]
//! # path = "content.json"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::engine::clock::MAX_SPAN_SECS;
use crate::engine::combat::DEFAULT_FLEE_CHANCE;
use crate::engine::encounter::DEFAULT_MIN_INTERVAL_SECS;
use crate::engine::log::DEFAULT_LOG_CAPACITY;
use crate::engine::quest::{DEFAULT_DAILY_RESET_HOURS, MAX_DAILY_RESET_HOURS};
use crate::engine::world::EngineSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_flee_chance")]
    pub flee_chance: f64,
    #[serde(default = "default_min_interval")]
    pub adventure_min_interval_secs: u64,
    #[serde(default = "default_reset_hours")]
    pub daily_reset_hours: i64,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Fixed seed for reproducible sessions. Entropy when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

fn default_flee_chance() -> f64 {
    DEFAULT_FLEE_CHANCE
}

fn default_min_interval() -> u64 {
    DEFAULT_MIN_INTERVAL_SECS
}

fn default_reset_hours() -> i64 {
    DEFAULT_DAILY_RESET_HOURS
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flee_chance: DEFAULT_FLEE_CHANCE,
            adventure_min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            daily_reset_hours: DEFAULT_DAILY_RESET_HOURS,
            log_capacity: DEFAULT_LOG_CAPACITY,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            flee_chance: self.flee_chance,
            adventure_min_interval_secs: self.adventure_min_interval_secs,
            daily_reset_hours: self.daily_reset_hours,
            log_capacity: self.log_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Directory holding the sled save database.
    pub fn saves_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("saves")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: Some("cultivation.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentConfig {
    /// JSON content tables. The built-in world is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            log::debug!("config file {} not found, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if !(0.0..=1.0).contains(&engine.flee_chance) {
            return Err(anyhow!(
                "engine.flee_chance must be between 0 and 1 (got {})",
                engine.flee_chance
            ));
        }
        if !(1..=MAX_DAILY_RESET_HOURS).contains(&engine.daily_reset_hours) {
            return Err(anyhow!(
                "engine.daily_reset_hours must be between 1 and {}",
                MAX_DAILY_RESET_HOURS
            ));
        }
        if engine.adventure_min_interval_secs > MAX_SPAN_SECS {
            return Err(anyhow!(
                "engine.adventure_min_interval_secs must not exceed {}",
                MAX_SPAN_SECS
            ));
        }
        if engine.log_capacity == 0 {
            return Err(anyhow!("engine.log_capacity must be positive"));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(anyhow!("logging.level '{}' is not recognized", self.logging.level));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.engine.settings(), EngineSettings::default());
        assert!(config.storage.saves_dir().starts_with(&config.storage.data_dir));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            rng_seed = 7
            flee_chance = 0.5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.rng_seed, Some(7));
        assert_eq!(config.engine.flee_chance, 0.5);
        assert_eq!(config.engine.daily_reset_hours, 24);
        assert_eq!(config.storage.data_dir, "./data");
        assert_eq!(config.logging.file, None);
        assert!(config.content.path.is_none());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.engine.flee_chance = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.daily_reset_hours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.adventure_min_interval_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn create_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded, Config::default());
    }
}
