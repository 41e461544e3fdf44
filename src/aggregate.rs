//! Per-device aggregation of health records
//!
//! A single streaming pass folds the ordered record stream into, per device:
//! a temperature-occurrence histogram, a rolling temperature summary, and the
//! most recent health sample (last-write-wins). Aggregates are rebuilt from
//! scratch on every full log parse - there is no cross-restart state here.
//!
//! Records are chronological per device but not necessarily globally; sample
//! intervals are therefore computed only between consecutive records of the
//! same device, in log order.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::ingest::HealthRecord;

/// One histogram bucket, keyed externally by integer temperature (deg C).
///
/// `count` only ever increases and `last_date` only ever advances; bucket
/// counts for a device sum to that device's record count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub count: u64,
    #[serde(with = "crate::ingest::log_date")]
    pub last_date: NaiveDateTime,
}

/// Rolling temperature statistics for one device.
///
/// Mean and median are computed over integer-cast samples; display-time
/// rounding is a renderer concern, not an accumulation one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSummary {
    pub min: i64,
    pub mean: i64,
    pub median: i64,
    pub max: i64,
    /// Latest timestamp among records at the maximum temperature.
    #[serde(with = "crate::ingest::log_date")]
    pub max_date: NaiveDateTime,
    /// Earliest record timestamp for the device.
    #[serde(with = "crate::ingest::log_date")]
    pub start_date: NaiveDateTime,
    /// Median of all inter-sample gaps, in seconds. 0 when fewer than two
    /// records exist.
    pub median_sample_interval: i64,
    /// Median of only the last two gaps - smooths single-sample noise while
    /// still tracking the recent rate.
    pub current_sample_interval: i64,
}

/// Everything known about one device after a full log pass.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAggregate {
    pub histogram: BTreeMap<i32, HistogramBucket>,
    pub summary: TemperatureSummary,
    /// Fields of the most recently ingested record, no aggregation.
    pub health: HealthRecord,
}

/// Per-device working state during the streaming pass.
struct DeviceState {
    histogram: BTreeMap<i32, HistogramBucket>,
    /// (timestamp, integer-cast temperature) in log order.
    samples: Vec<(NaiveDateTime, i64)>,
    /// Seconds between consecutive records, in log order.
    intervals: Vec<i64>,
    last_sample_time: Option<NaiveDateTime>,
    latest: HealthRecord,
}

/// Streaming aggregation engine. Feed records with [`Aggregator::ingest`],
/// then call [`Aggregator::finish`] to compute the summaries.
#[derive(Default)]
pub struct Aggregator {
    devices: BTreeMap<String, DeviceState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the device's histogram and series.
    pub fn ingest(&mut self, record: HealthRecord) {
        let bucket_key = record.mean_temperature.round() as i32;
        let ts = record.timestamp;

        let state = self
            .devices
            .entry(record.device.clone())
            .or_insert_with(|| DeviceState {
                histogram: BTreeMap::new(),
                samples: Vec::new(),
                intervals: Vec::new(),
                last_sample_time: None,
                latest: record.clone(),
            });

        let bucket = state
            .histogram
            .entry(bucket_key)
            .or_insert_with(|| HistogramBucket {
                count: 0,
                last_date: ts,
            });
        bucket.count += 1;
        bucket.last_date = bucket.last_date.max(ts);

        state.samples.push((ts, record.mean_temperature as i64));
        if let Some(prev) = state.last_sample_time {
            // Clamp defends the invariant against an out-of-order pair for
            // one device, which the log contract rules out anyway.
            state.intervals.push((ts - prev).num_seconds().max(0));
        }
        state.last_sample_time = Some(ts);
        state.latest = record;
    }

    /// Compute the per-device summaries and consume the accumulator.
    pub fn finish(self) -> DeviceAggregates {
        let devices = self
            .devices
            .into_iter()
            .map(|(name, state)| {
                let aggregate = summarize(state);
                (name, aggregate)
            })
            .collect();
        DeviceAggregates { devices }
    }
}

fn summarize(state: DeviceState) -> DeviceAggregate {
    // A device entry is only created alongside a record, so the series is
    // never empty here.
    debug_assert!(!state.samples.is_empty());

    let start_date = state
        .samples
        .iter()
        .map(|(ts, _)| *ts)
        .min()
        .unwrap_or_default();

    let temps: Vec<i64> = state.samples.iter().map(|(_, t)| *t).collect();
    let min = temps.iter().copied().min().unwrap_or(0);
    let max = temps.iter().copied().max().unwrap_or(0);
    let mean = if temps.is_empty() {
        0
    } else {
        (temps.iter().sum::<i64>() as f64 / temps.len() as f64) as i64
    };
    let median = median_i64(&temps);

    let max_date = state
        .samples
        .iter()
        .filter(|(_, t)| *t == max)
        .map(|(ts, _)| *ts)
        .max()
        .unwrap_or(start_date);

    let median_sample_interval = median_i64(&state.intervals);
    let last_two = &state.intervals[state.intervals.len().saturating_sub(2)..];
    let current_sample_interval = median_i64(last_two);

    DeviceAggregate {
        histogram: state.histogram,
        summary: TemperatureSummary {
            min,
            mean,
            median,
            max,
            max_date,
            start_date,
            median_sample_interval,
            current_sample_interval,
        },
        health: state.latest,
    }
}

/// Median by sort + midpoint, truncated toward zero. 0 for an empty slice.
fn median_i64(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        ((sorted[mid - 1] + sorted[mid]) as f64 / 2.0) as i64
    }
}

/// Finished aggregates for all devices, iterated in sorted device order so
/// every consumer sees the same deterministic sequence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceAggregates {
    devices: BTreeMap<String, DeviceAggregate>,
}

impl DeviceAggregates {
    /// Build aggregates from an ordered record stream in one call.
    pub fn from_records<I: IntoIterator<Item = HealthRecord>>(records: I) -> Self {
        let mut aggregator = Aggregator::new();
        for record in records {
            aggregator.ingest(record);
        }
        aggregator.finish()
    }

    /// Ordered device-identifier list (sorted, deterministic).
    pub fn device_names(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn get(&self, device: &str) -> Option<&DeviceAggregate> {
        self.devices.get(device)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceAggregate)> {
        self.devices.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}
