//! Alert history persistence
//!
//! A small device -> metric -> {last_value, last_alert_time} mapping, read at
//! evaluation start and rewritten only after a successful alert send. The
//! snapshot is pretty-printed JSON so operators can diff it across cycles.
//!
//! An unreadable or missing snapshot is a cold start, never fatal: the worst
//! case is one duplicate alert. A crash between a successful send and the
//! save has the same accepted consequence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("cannot write alert history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode alert history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Last alerted state for one (device, metric) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    pub last_value: f64,
    #[serde(with = "crate::ingest::log_date")]
    pub last_alert_time: NaiveDateTime,
}

/// Durable device -> metric -> [`AlertHistoryEntry`] mapping.
///
/// Lookups return `None` for absent pairs rather than materializing empty
/// entries; only an actual alert writes state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertHistory {
    devices: BTreeMap<String, BTreeMap<String, AlertHistoryEntry>>,
}

impl AlertHistory {
    /// Load the snapshot, treating any failure as a cold start.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no alert history snapshot - cold start");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "alert history unreadable - cold start");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(history) => history,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "alert history corrupt - cold start");
                Self::default()
            }
        }
    }

    /// Rewrite the full snapshot.
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let encoded = serde_json::to_string_pretty(self)?;
        std::fs::write(path, encoded).map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read-only lookup with a defined "no history" sentinel.
    pub fn entry(&self, device: &str, metric: &str) -> Option<&AlertHistoryEntry> {
        self.devices.get(device)?.get(metric)
    }

    /// Record that an alert was emitted for this (device, metric).
    pub fn record(&mut self, device: &str, metric: &str, value: f64, when: NaiveDateTime) {
        self.devices.entry(device.to_string()).or_default().insert(
            metric.to_string(),
            AlertHistoryEntry {
                last_value: value,
                last_alert_time: when,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
