//! Health log ingestion
//!
//! Reads the append-only NVMe health log (one JSON object per line, as
//! produced by the sampling daemon) and decodes each line into a canonical
//! [`HealthRecord`]. The read is one-shot and blocking: a running process
//! never observes records appended after its own start.
//!
//! A malformed line aborts the entire pass. Callers that need per-line
//! resilience must pre-filter the log before handing it over.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp format used throughout the health log.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode errors are fatal to the ingestion pass - no partial salvage.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot read health log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed health record at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Serde adapter for `"YYYY-MM-DD HH:MM:SS"` timestamps.
pub mod log_date {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(super::DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, super::DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// One decoded SMART health sample. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Device path as logged by the sampler (e.g. `/dev/nvme0n1`).
    pub device: String,

    #[serde(with = "log_date")]
    pub timestamp: NaiveDateTime,

    /// Mean of the controller temperature and all reporting sensors (deg C).
    pub mean_temperature: f64,

    /// Per-sensor temperatures (deg C), in sensor-index order. Logged as
    /// flat `sensor_N_c` keys; canonicalized into a vector on decode.
    #[serde(skip)]
    pub sensor_temps: Vec<f64>,

    pub power_on_hours: u64,
    pub unsafe_shutdowns: u64,
    pub media_errors: u64,
    pub num_err_log_entries: u64,
    pub percentage_used: u64,

    /// 0-100, higher is better.
    pub health_score: i64,
}

/// Wire shape of one log line. Sensor temperatures arrive as flat
/// `sensor_1_c` .. `sensor_8_c` keys, so the decoder collects them from the
/// flattened remainder rather than enumerating eight optional fields.
#[derive(Deserialize)]
struct RawRecord {
    device: String,
    timestamp: String,
    mean_temperature: f64,
    power_on_hours: u64,
    unsafe_shutdowns: u64,
    media_errors: u64,
    num_err_log_entries: u64,
    percentage_used: u64,
    health_score: i64,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

fn decode_line(line: &str) -> Result<HealthRecord, serde_json::Error> {
    let raw: RawRecord = serde_json::from_str(line)?;

    let timestamp = NaiveDateTime::parse_from_str(&raw.timestamp, DATE_FORMAT)
        .map_err(serde::de::Error::custom)?;

    // BTreeMap iteration keeps sensors in index order for single digits,
    // which is all the NVMe spec allows (sensors 1-8).
    let sensor_temps = raw
        .extra
        .iter()
        .filter(|(k, _)| k.starts_with("sensor_") && k.ends_with("_c"))
        .filter_map(|(_, v)| v.as_f64())
        .collect();

    Ok(HealthRecord {
        device: raw.device,
        timestamp,
        mean_temperature: raw.mean_temperature,
        sensor_temps,
        power_on_hours: raw.power_on_hours,
        unsafe_shutdowns: raw.unsafe_shutdowns,
        media_errors: raw.media_errors,
        num_err_log_entries: raw.num_err_log_entries,
        percentage_used: raw.percentage_used,
        health_score: raw.health_score,
    })
}

/// Read and decode the full health log, in file order.
pub fn read_log(path: &Path) -> Result<Vec<HealthRecord>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = decode_line(&line).map_err(|source| DecodeError::Malformed {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }

    tracing::debug!(path = %path.display(), count = records.len(), "health log decoded");
    Ok(records)
}

/// Human-facing device name: the basename of the logged device path.
pub fn display_name(device: &str) -> &str {
    device.rsplit('/').next().unwrap_or(device)
}

/// Raw SMART counters needed for health scoring. All fields optional since
/// drives differ in what they report.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartCounters {
    pub percent_used: Option<u64>,
    pub media_errors: Option<u64>,
    pub num_err_log_entries: Option<u64>,
    pub critical_warning: Option<u64>,
}

/// Compute a 0-100 health score from raw SMART counters.
/// 100 = perfect, 0 = catastrophic failure.
///
/// Weighted deductions: wear dominates (up to 60 points), then media errors
/// (40), controller error log (20), and a flat 30 for any critical warning.
pub fn health_score(smart: &SmartCounters) -> i64 {
    let mut score = 100.0_f64;

    if let Some(used) = smart.percent_used {
        if used >= 100 {
            score -= 60.0;
        } else {
            score -= (used as f64 * 0.6).min(60.0);
        }
    }

    if let Some(errors) = smart.media_errors {
        score -= (errors as f64 * 2.0).min(40.0);
    }

    if let Some(entries) = smart.num_err_log_entries {
        score -= (entries as f64 * 0.5).min(20.0);
    }

    if smart.critical_warning.unwrap_or(0) != 0 {
        score -= 30.0;
    }

    (score as i64).clamp(0, 100)
}
