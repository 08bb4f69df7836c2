//! Configuration management
//!
//! Manages storage location, the learning user, and the confirmation and
//! exploration thresholds. Stored as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::LearningError;
use crate::learning::aggregator::CONFIRMED_THRESHOLD;
use crate::learning::exploration::DEFAULT_CONFIDENCE_BUMP;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Database settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Learning engine settings
    #[serde(default)]
    pub learning: LearningConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; defaults to `patterns.db` in the data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// User the CLI acts on behalf of
    #[serde(default = "default_user_id")]
    pub user_id: i64,
    /// Minimum confidence for patterns shown as confirmed
    #[serde(default = "default_confirmed_min_confidence")]
    pub confirmed_min_confidence: u8,
    /// Confidence added per exploration session
    #[serde(default = "default_exploration_bump")]
    pub exploration_bump: u8,
    /// Name used to detect feedback addressed to the assistant
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

fn default_user_id() -> i64 {
    1
}

fn default_confirmed_min_confidence() -> u8 {
    CONFIRMED_THRESHOLD
}

fn default_exploration_bump() -> u8 {
    DEFAULT_CONFIDENCE_BUMP
}

fn default_assistant_name() -> String {
    "Sandy".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            confirmed_min_confidence: default_confirmed_min_confidence(),
            exploration_bump: default_exploration_bump(),
            assistant_name: default_assistant_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject thresholds outside 0..=100 and a zero exploration bump
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.learning.confirmed_min_confidence > 100 {
            return Err(LearningError::Config(format!(
                "confirmed_min_confidence must be at most 100, got {}",
                self.learning.confirmed_min_confidence
            )));
        }
        if self.learning.exploration_bump == 0 || self.learning.exploration_bump > 100 {
            return Err(LearningError::Config(format!(
                "exploration_bump must be between 1 and 100, got {}",
                self.learning.exploration_bump
            )));
        }
        Ok(())
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("patterns.db")),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "pattern-learning", "pattern-learning")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Pattern Learning Configuration");
    println!("  config file:              {}", config_path()?.display());
    println!("  database:                 {}", config.database_path()?.display());
    println!("  user id:                  {}", config.learning.user_id);
    println!("  confirmed min confidence: {}%", config.learning.confirmed_min_confidence);
    println!("  exploration bump:         {}", config.learning.exploration_bump);
    println!("  assistant name:           {}", config.learning.assistant_name);
    println!("  log level:                {}", config.log_level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.learning.user_id, 1);
        assert_eq!(config.learning.confirmed_min_confidence, 80);
        assert_eq!(config.learning.exploration_bump, 15);
        assert_eq!(config.log_level, "warn");
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[learning]\nuser_id = 7\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.learning.user_id, 7);
        assert_eq!(config.learning.exploration_bump, 15);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage.database_path = Some(dir.path().join("p.db"));
        config.log_level = "debug".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.storage.database_path, config.storage.database_path);
        assert_eq!(loaded.database_path().unwrap(), dir.path().join("p.db"));
        assert_eq!(loaded.log_level, "debug");
    }

    #[test]
    fn test_rejects_zero_bump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[learning]\nexploration_bump = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
