//! Runtime configuration
//!
//! Loaded from a YAML file in the platform config directory (or an explicit
//! path). Every field has a default, so an empty or missing file is valid.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{actor::delivery::DeliverySettings, adapter::journal::JournalType};

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Journal backend
    pub journal:       JournalType,
    /// RocksDB directory; defaults to `<config dir>/journal.db`
    pub database_path: Option<PathBuf>,
    /// Per-process-instance settings
    pub process:       ProcessSettings
}

/// Settings applied to every process instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSettings {
    /// Inactivity before an instance checks whether it may passivate; none disables it
    pub idle_timeout_ms:        Option<u64>,
    /// Interval between redeliveries of an unconfirmed command
    pub redeliver_interval_ms:  u64,
    /// Upper bound of commands resent per redelivery tick
    pub redelivery_burst_limit: usize,
    /// Attempts after which an unconfirmed delivery is reported
    pub warn_after_attempts:    u32,
    /// Timeout for request/reply calls into the office
    pub call_timeout_ms:        u64
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms:        Some(120_000),
            redeliver_interval_ms:  5_000,
            redelivery_burst_limit: 10_000,
            warn_after_attempts:    5,
            call_timeout_ms:        30_000
        }
    }
}

impl ProcessSettings {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub fn redeliver_interval(&self) -> Duration {
        Duration::from_millis(self.redeliver_interval_ms.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            redeliver_interval:     self.redeliver_interval(),
            redelivery_burst_limit: self.redelivery_burst_limit.max(1),
            warn_after_attempts:    self.warn_after_attempts
        }
    }
}

impl RuntimeConfig {
    /// Load from `path`, or from the default location when `None`
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (get_config_file_path()?, false)
        };

        if !config_path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_yaml(&content).with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Invalid runtime configuration")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }

    /// Database path, falling back to the default location
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_config_dir()?.join("journal.db"))
        }
    }
}

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "saga-runtime").context("Failed to determine project directories")
}

/// Get the configuration directory path
pub fn get_config_dir() -> Result<PathBuf> {
    let project_dirs = get_project_dirs()?;
    Ok(project_dirs.config_dir().to_path_buf())
}

/// Get the config file path
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RuntimeConfig::from_yaml("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = RuntimeConfig::from_yaml(
            "journal: rocksdb\ndatabase_path: /tmp/saga\nprocess:\n  idle_timeout_ms: ~\n  redeliver_interval_ms: 250\n"
        )
        .unwrap();

        assert_eq!(config.journal, JournalType::RocksDb);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/saga")));
        assert_eq!(config.process.idle_timeout(), None);
        assert_eq!(config.process.redeliver_interval(), Duration::from_millis(250));
        assert_eq!(config.process.warn_after_attempts, 5);
        assert_eq!(config.process.redelivery_burst_limit, 10_000);
    }

    #[test]
    fn test_unknown_journal_is_rejected() {
        assert!(RuntimeConfig::from_yaml("journal: cassandra").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "process:\n  warn_after_attempts: 2\n").unwrap();

        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.process.delivery_settings().warn_after_attempts, 2);

        assert!(RuntimeConfig::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = RuntimeConfig::default().to_yaml().unwrap();
        assert_eq!(RuntimeConfig::from_yaml(&yaml).unwrap(), RuntimeConfig::default());
    }
}
