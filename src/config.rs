//! Monitor configuration
//!
//! TOML configuration with serde defaults, loaded through the standard
//! search order:
//!
//! 1. Explicit `--config` path (fatal if unreadable or malformed)
//! 2. `$NVMEMON_CONFIG` environment variable
//! 3. `./nvmemon.toml` in the current working directory
//! 4. Built-in defaults (alerting disabled, no thresholds)
//!
//! A config file that is *found* but malformed is always fatal - silently
//! falling back to defaults would disable alerting without anyone noticing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable pointing at an alternate config file.
pub const CONFIG_ENV_VAR: &str = "NVMEMON_CONFIG";

/// Config file searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "nvmemon.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid alert interval {value:?}: {source}")]
    InvalidInterval {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Root configuration. Every section has serde defaults so a partial file
/// only overrides what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSection,

    /// Metric name -> numeric threshold. Only metrics named here are
    /// candidates for alerting.
    #[serde(default)]
    pub alert_thresholds: BTreeMap<String, f64>,

    #[serde(default)]
    pub alert_settings: AlertSettings,
}

/// Paths and cadence. Injected at construction, never process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Append-only health log written by the sampling daemon.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Dashboard refresh interval and headless cycle sleep, in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/nvme_health.json")
}

fn default_refresh_interval_secs() -> u64 {
    10
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl MonitorSection {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default)]
    pub alerts_enabled: bool,

    /// Minimum duration before a previously-alerted (device, metric) may
    /// re-alert absent regression. Human-readable, e.g. `"1h"`, `"30m"`.
    #[serde(default = "default_alert_interval")]
    pub alert_interval: String,

    /// Alert-history snapshot location.
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

fn default_alert_interval() -> String {
    "1h".to_string()
}

fn default_history_file() -> PathBuf {
    PathBuf::from(".nvmemon_alert_history.json")
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            alerts_enabled: false,
            alert_interval: default_alert_interval(),
            history_file: default_history_file(),
        }
    }
}

impl AlertSettings {
    /// Parse the configured alert interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.alert_interval).map_err(|source| {
            ConfigError::InvalidInterval {
                value: self.alert_interval.clone(),
                source,
            }
        })
    }
}

impl MonitorConfig {
    /// Load configuration using the standard search order. An explicit path
    /// always wins and is fatal on any error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "loaded config");
            return Ok(config);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(&env_path);
            let config = Self::load_from_file(&path)?;
            info!(path = %path.display(), "loaded config from {CONFIG_ENV_VAR}");
            return Ok(config);
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("loaded config from ./{CONFIG_FILE_NAME}");
            return Ok(config);
        }

        info!("no config file found - using built-in defaults (alerting disabled)");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.warn_unknown_thresholds();
        Ok(config)
    }

    /// Warn about threshold keys that match no known metric - almost always
    /// a typo that would silently never alert.
    fn warn_unknown_thresholds(&self) {
        for key in self.alert_thresholds.keys() {
            if !crate::alert::Metric::ALL.iter().any(|m| m.key() == key) {
                warn!(metric = %key, "alert_thresholds entry matches no known metric");
            }
        }
    }
}
