//! Alert evaluation and deduplication
//!
//! Per device and metric, compares the most recent health sample against the
//! configured thresholds and decides whether a new notification is warranted
//! given prior alert history.
//!
//! The suppression rule: an over-threshold metric alerts iff any of
//!
//! - no prior alert exists for the (device, metric) pair, or
//! - the configured alert interval has elapsed since the prior alert, or
//! - the value has regressed, i.e. is strictly worse than the value recorded
//!   at the prior alert under the metric's own comparator.
//!
//! History is committed per device per cycle, all-or-nothing: it is written
//! back only after the device's alert batch is handed to the transport
//! successfully. A failed send leaves history untouched so the unresolved
//! condition re-triggers on the next cycle.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::aggregate::DeviceAggregates;
use crate::alert::history::AlertHistory;
use crate::alert::transport::AlertTransport;
use crate::config::{AlertSettings, ConfigError};
use crate::ingest::{display_name, HealthRecord};

/// Whether larger or smaller values are worse for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    /// Larger is worse (error counters, wear, temperature).
    Ascending,
    /// Smaller is worse (health score).
    Descending,
}

impl MetricDirection {
    /// Directional threshold comparison: does `value` breach `threshold`?
    fn breaches(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Ascending => value > threshold,
            Self::Descending => value < threshold,
        }
    }

    /// Regression check: is `current` strictly worse than `last`?
    fn is_worse(self, current: f64, last: f64) -> bool {
        self.breaches(current, last)
    }
}

/// Fixed registry of alertable SMART metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    NumErrLogEntries,
    UnsafeShutdowns,
    PercentageUsed,
    MediaErrors,
    HealthScore,
    MeanTemperature,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::NumErrLogEntries,
        Metric::UnsafeShutdowns,
        Metric::PercentageUsed,
        Metric::MediaErrors,
        Metric::HealthScore,
        Metric::MeanTemperature,
    ];

    /// Key used in both the thresholds config and the history snapshot.
    pub fn key(self) -> &'static str {
        match self {
            Metric::NumErrLogEntries => "num_err_log_entries",
            Metric::UnsafeShutdowns => "unsafe_shutdowns",
            Metric::PercentageUsed => "percentage_used",
            Metric::MediaErrors => "media_errors",
            Metric::HealthScore => "health_score",
            Metric::MeanTemperature => "mean_temperature",
        }
    }

    pub fn direction(self) -> MetricDirection {
        match self {
            Metric::HealthScore => MetricDirection::Descending,
            _ => MetricDirection::Ascending,
        }
    }

    /// Extract this metric's value from a health sample.
    pub fn value(self, health: &HealthRecord) -> f64 {
        match self {
            Metric::NumErrLogEntries => health.num_err_log_entries as f64,
            Metric::UnsafeShutdowns => health.unsafe_shutdowns as f64,
            Metric::PercentageUsed => health.percentage_used as f64,
            Metric::MediaErrors => health.media_errors as f64,
            Metric::HealthScore => health.health_score as f64,
            Metric::MeanTemperature => health.mean_temperature,
        }
    }
}

/// Integral values print without a trailing `.0` so counter alerts read
/// naturally ("media_errors = 5", not "5.0").
fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Evaluate one device's health sample against the configured thresholds.
///
/// Returns the alert lines to emit this cycle and the updated history. The
/// caller decides whether the update is committed (only after a successful
/// send) or discarded.
pub fn evaluate(
    device: &str,
    health: &HealthRecord,
    thresholds: &BTreeMap<String, f64>,
    alert_interval: Duration,
    history: &AlertHistory,
    now: NaiveDateTime,
) -> (Vec<String>, AlertHistory) {
    let mut lines = Vec::new();
    let mut updated = history.clone();

    for metric in Metric::ALL {
        let Some(&threshold) = thresholds.get(metric.key()) else {
            continue;
        };

        let value = metric.value(health);
        let direction = metric.direction();
        if !direction.breaches(value, threshold) {
            continue;
        }

        let emit = match history.entry(device, metric.key()) {
            None => true,
            Some(prior) => {
                now - prior.last_alert_time > alert_interval
                    || direction.is_worse(value, prior.last_value)
            }
        };

        if !emit {
            debug!(
                device = %device,
                metric = metric.key(),
                value,
                "alert suppressed - within interval and not regressed"
            );
            continue;
        }

        lines.push(format!(
            "{} = {}. Configured threshold is {}.",
            metric.key(),
            fmt_value(value),
            fmt_value(threshold)
        ));
        updated.record(device, metric.key(), value, now);
    }

    (lines, updated)
}

/// Outcome of one full alert-evaluation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub alerts_sent: usize,
    pub send_failures: usize,
}

/// Runs alert cycles over all devices: evaluate, send, commit history.
pub struct AlertEngine<'a, T: AlertTransport + ?Sized> {
    thresholds: &'a BTreeMap<String, f64>,
    settings: &'a AlertSettings,
    transport: &'a T,
}

impl<'a, T: AlertTransport + ?Sized> AlertEngine<'a, T> {
    pub fn new(
        thresholds: &'a BTreeMap<String, f64>,
        settings: &'a AlertSettings,
        transport: &'a T,
    ) -> Self {
        Self {
            thresholds,
            settings,
            transport,
        }
    }

    /// Run one evaluation cycle over all devices.
    ///
    /// History is read once at cycle start and committed per device only
    /// after that device's batch sends successfully. Transport failures are
    /// logged and recovered: the condition re-triggers next cycle.
    pub fn run_cycle(
        &self,
        aggregates: &DeviceAggregates,
        history_path: &Path,
        now: NaiveDateTime,
    ) -> Result<CycleOutcome, ConfigError> {
        // Parsed once per evaluation, per the configuration contract. An
        // interval too large for chrono behaves as never-expiring.
        let interval = Duration::from_std(self.settings.interval()?).unwrap_or(Duration::MAX);

        let mut history = AlertHistory::load(history_path);
        let mut outcome = CycleOutcome::default();

        for (device, aggregate) in aggregates.iter() {
            let name = display_name(device);
            let (lines, updated) = evaluate(
                name,
                &aggregate.health,
                self.thresholds,
                interval,
                &history,
                now,
            );
            if lines.is_empty() {
                continue;
            }

            let subject = format!("SMART Data Alert for Device {name}");
            let body = format!(
                "The following SMART metrics crossed their configured thresholds:\n\n{}\n\n-- nvmemon, device {name}\n",
                lines.join("\n")
            );

            match self.transport.send(&subject, &body) {
                Ok(()) => {
                    history = updated;
                    if let Err(e) = history.save(history_path) {
                        // Next cycle re-reads the stale snapshot; worst case
                        // is one duplicate alert.
                        warn!(device = %name, error = %e, "alert sent but history save failed");
                    }
                    info!(device = %name, alerts = lines.len(), "alert dispatched");
                    outcome.alerts_sent += 1;
                }
                Err(e) => {
                    warn!(device = %name, error = %e, "alert send failed - history untouched");
                    outcome.send_failures += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(time: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .expect("valid date")
            .and_time(time.parse().expect("valid time"))
    }

    fn health(media_errors: u64, health_score: i64) -> HealthRecord {
        HealthRecord {
            device: "/dev/nvme0n1".to_string(),
            timestamp: ts("10:00:00"),
            mean_temperature: 40.0,
            sensor_temps: vec![],
            power_on_hours: 100,
            unsafe_shutdowns: 0,
            media_errors,
            num_err_log_entries: 0,
            percentage_used: 1,
            health_score,
        }
    }

    fn thresholds(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    const HOUR: i64 = 3600;

    #[test]
    fn first_breach_alerts_and_updates_history() {
        let t = thresholds(&[("media_errors", 3.0)]);
        let history = AlertHistory::default();

        let (lines, updated) = evaluate(
            "nvme0n1",
            &health(5, 99),
            &t,
            Duration::try_seconds(HOUR).expect("fits"),
            &history,
            ts("10:00:00"),
        );

        assert_eq!(lines, vec!["media_errors = 5. Configured threshold is 3."]);
        let entry = updated.entry("nvme0n1", "media_errors").expect("recorded");
        assert_eq!(entry.last_value, 5.0);
        assert_eq!(entry.last_alert_time, ts("10:00:00"));
    }

    #[test]
    fn same_value_within_interval_is_suppressed() {
        let t = thresholds(&[("media_errors", 3.0)]);
        let history = AlertHistory::default();
        let interval = Duration::try_seconds(HOUR).expect("fits");

        let (_, after_first) =
            evaluate("nvme0n1", &health(5, 99), &t, interval, &history, ts("10:00:00"));
        let (lines, _) = evaluate(
            "nvme0n1",
            &health(5, 99),
            &t,
            interval,
            &after_first,
            ts("10:10:00"),
        );

        assert!(lines.is_empty());
    }

    #[test]
    fn regression_re_alerts_within_interval() {
        // media_errors 5 -> 9 against threshold 3: worse value overrides the
        // unexpired interval.
        let t = thresholds(&[("media_errors", 3.0)]);
        let interval = Duration::try_seconds(HOUR).expect("fits");
        let (_, after_first) = evaluate(
            "nvme0n1",
            &health(5, 99),
            &t,
            interval,
            &AlertHistory::default(),
            ts("10:00:00"),
        );

        let (lines, updated) = evaluate(
            "nvme0n1",
            &health(9, 99),
            &t,
            interval,
            &after_first,
            ts("10:10:00"),
        );

        assert_eq!(lines, vec!["media_errors = 9. Configured threshold is 3."]);
        let entry = updated.entry("nvme0n1", "media_errors").expect("recorded");
        assert_eq!(entry.last_value, 9.0);
    }

    #[test]
    fn expired_interval_re_alerts_same_value() {
        let t = thresholds(&[("media_errors", 3.0)]);
        let interval = Duration::try_seconds(HOUR).expect("fits");
        let (_, after_first) = evaluate(
            "nvme0n1",
            &health(5, 99),
            &t,
            interval,
            &AlertHistory::default(),
            ts("08:00:00"),
        );

        let (lines, _) = evaluate(
            "nvme0n1",
            &health(5, 99),
            &t,
            interval,
            &after_first,
            ts("10:00:00"),
        );

        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn health_score_direction_is_inverted() {
        let t = thresholds(&[("health_score", 50.0)]);
        let interval = Duration::try_seconds(HOUR).expect("fits");

        // Below threshold -> candidate.
        let (lines, _) = evaluate(
            "nvme0n1",
            &health(0, 40),
            &t,
            interval,
            &AlertHistory::default(),
            ts("10:00:00"),
        );
        assert_eq!(lines, vec!["health_score = 40. Configured threshold is 50."]);

        // Above threshold -> not a candidate.
        let (lines, _) = evaluate(
            "nvme0n1",
            &health(0, 60),
            &t,
            interval,
            &AlertHistory::default(),
            ts("10:00:00"),
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn health_score_regression_means_lower() {
        let t = thresholds(&[("health_score", 50.0)]);
        let interval = Duration::try_seconds(HOUR).expect("fits");
        let (_, after_first) = evaluate(
            "nvme0n1",
            &health(0, 40),
            &t,
            interval,
            &AlertHistory::default(),
            ts("10:00:00"),
        );

        // Same score within interval: suppressed.
        let (lines, _) = evaluate(
            "nvme0n1",
            &health(0, 40),
            &t,
            interval,
            &after_first,
            ts("10:10:00"),
        );
        assert!(lines.is_empty());

        // Lower score within interval: regressed, re-alerts.
        let (lines, _) = evaluate(
            "nvme0n1",
            &health(0, 30),
            &t,
            interval,
            &after_first,
            ts("10:10:00"),
        );
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn value_at_threshold_is_not_a_candidate() {
        let t = thresholds(&[("media_errors", 3.0)]);
        let (lines, _) = evaluate(
            "nvme0n1",
            &health(3, 99),
            &t,
            Duration::try_seconds(HOUR).expect("fits"),
            &AlertHistory::default(),
            ts("10:00:00"),
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn unconfigured_metrics_are_ignored() {
        // unsafe_shutdowns has no threshold, so even a huge value is silent.
        let mut sample = health(0, 99);
        sample.unsafe_shutdowns = 10_000;
        let t = thresholds(&[("media_errors", 3.0)]);

        let (lines, _) = evaluate(
            "nvme0n1",
            &sample,
            &t,
            Duration::try_seconds(HOUR).expect("fits"),
            &AlertHistory::default(),
            ts("10:00:00"),
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn temperature_values_keep_fraction_in_lines() {
        let mut sample = health(0, 99);
        sample.mean_temperature = 71.5;
        let t = thresholds(&[("mean_temperature", 70.0)]);

        let (lines, _) = evaluate(
            "nvme0n1",
            &sample,
            &t,
            Duration::try_seconds(HOUR).expect("fits"),
            &AlertHistory::default(),
            ts("10:00:00"),
        );
        assert_eq!(
            lines,
            vec!["mean_temperature = 71.5. Configured threshold is 70."]
        );
    }
}
