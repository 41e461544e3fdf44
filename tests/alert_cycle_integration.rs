//! Alert cycle integration tests
//!
//! Exercise the full evaluate -> send -> commit-history path with a scripted
//! transport and an on-disk history snapshot.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use nvmemon::aggregate::DeviceAggregates;
use nvmemon::alert::{AlertEngine, AlertHistory, AlertTransport, TransportError};
use nvmemon::config::AlertSettings;
use nvmemon::ingest::HealthRecord;

/// Records every delivery; optionally fails them all.
struct ScriptedTransport {
    fail: bool,
    sent: RefCell<Vec<(String, String)>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            fail: false,
            sent: RefCell::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl AlertTransport for ScriptedTransport {
    fn send(&self, subject: &str, body: &str) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Build("scripted failure".to_string()));
        }
        self.sent
            .borrow_mut()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn ts(time: &str) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .expect("valid date")
        .and_time(time.parse().expect("valid time"))
}

fn aggregates_with_media_errors(errors: u64) -> DeviceAggregates {
    DeviceAggregates::from_records(vec![HealthRecord {
        device: "/dev/nvme0n1".to_string(),
        timestamp: ts("09:00:00"),
        mean_temperature: 40.0,
        sensor_temps: vec![],
        power_on_hours: 100,
        unsafe_shutdowns: 0,
        media_errors: errors,
        num_err_log_entries: 0,
        percentage_used: 1,
        health_score: 99,
    }])
}

fn thresholds() -> BTreeMap<String, f64> {
    [("media_errors".to_string(), 3.0)].into_iter().collect()
}

fn settings(history_file: PathBuf) -> AlertSettings {
    AlertSettings {
        alerts_enabled: true,
        alert_interval: "1h".to_string(),
        history_file,
    }
}

#[test]
fn breach_sends_one_alert_and_persists_history() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history_path = dir.path().join("history.json");
    let transport = ScriptedTransport::new();
    let t = thresholds();
    let s = settings(history_path.clone());
    let engine = AlertEngine::new(&t, &s, &transport);

    let outcome = engine
        .run_cycle(&aggregates_with_media_errors(5), &history_path, ts("10:00:00"))
        .expect("cycle runs");

    assert_eq!(outcome.alerts_sent, 1);
    let sent = transport.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "SMART Data Alert for Device nvme0n1");
    assert!(sent[0].1.contains("media_errors = 5. Configured threshold is 3."));

    // History round trip: the persisted snapshot reproduces the alerted state.
    let reloaded = AlertHistory::load(&history_path);
    let entry = reloaded.entry("nvme0n1", "media_errors").expect("persisted");
    assert_eq!(entry.last_value, 5.0);
    assert_eq!(entry.last_alert_time, ts("10:00:00"));
}

#[test]
fn second_cycle_same_value_is_suppressed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history_path = dir.path().join("history.json");
    let transport = ScriptedTransport::new();
    let t = thresholds();
    let s = settings(history_path.clone());
    let engine = AlertEngine::new(&t, &s, &transport);
    let aggregates = aggregates_with_media_errors(5);

    engine
        .run_cycle(&aggregates, &history_path, ts("10:00:00"))
        .expect("first cycle");
    let outcome = engine
        .run_cycle(&aggregates, &history_path, ts("10:10:00"))
        .expect("second cycle");

    assert_eq!(outcome.alerts_sent, 0);
    assert_eq!(transport.sent.borrow().len(), 1);
}

#[test]
fn second_cycle_worse_value_re_alerts_within_interval() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history_path = dir.path().join("history.json");
    let transport = ScriptedTransport::new();
    let t = thresholds();
    let s = settings(history_path.clone());
    let engine = AlertEngine::new(&t, &s, &transport);

    engine
        .run_cycle(&aggregates_with_media_errors(5), &history_path, ts("10:00:00"))
        .expect("first cycle");
    let outcome = engine
        .run_cycle(&aggregates_with_media_errors(9), &history_path, ts("10:10:00"))
        .expect("second cycle");

    assert_eq!(outcome.alerts_sent, 1);
    let entry = AlertHistory::load(&history_path)
        .entry("nvme0n1", "media_errors")
        .copied()
        .expect("updated");
    assert_eq!(entry.last_value, 9.0);
    assert_eq!(entry.last_alert_time, ts("10:10:00"));
}

#[test]
fn transport_failure_leaves_history_untouched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history_path = dir.path().join("history.json");
    let transport = ScriptedTransport::failing();
    let t = thresholds();
    let s = settings(history_path.clone());
    let engine = AlertEngine::new(&t, &s, &transport);

    let outcome = engine
        .run_cycle(&aggregates_with_media_errors(5), &history_path, ts("10:00:00"))
        .expect("cycle runs despite failure");

    assert_eq!(outcome.alerts_sent, 0);
    assert_eq!(outcome.send_failures, 1);
    assert!(!history_path.exists(), "no snapshot written on failure");

    // The unresolved condition re-triggers on the next cycle.
    let retry = ScriptedTransport::new();
    let engine = AlertEngine::new(&t, &s, &retry);
    let outcome = engine
        .run_cycle(&aggregates_with_media_errors(5), &history_path, ts("10:10:00"))
        .expect("retry cycle");
    assert_eq!(outcome.alerts_sent, 1);
}

#[test]
fn invalid_interval_aborts_the_cycle() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history_path = dir.path().join("history.json");
    let transport = ScriptedTransport::new();
    let t = thresholds();
    let s = AlertSettings {
        alerts_enabled: true,
        alert_interval: "whenever".to_string(),
        history_file: history_path.clone(),
    };
    let engine = AlertEngine::new(&t, &s, &transport);

    assert!(engine
        .run_cycle(&aggregates_with_media_errors(5), &history_path, ts("10:00:00"))
        .is_err());
    assert!(transport.sent.borrow().is_empty());
}

#[test]
fn healthy_devices_send_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history_path = dir.path().join("history.json");
    let transport = ScriptedTransport::new();
    let t = thresholds();
    let s = settings(history_path.clone());
    let engine = AlertEngine::new(&t, &s, &transport);

    let outcome = engine
        .run_cycle(&aggregates_with_media_errors(0), &history_path, ts("10:00:00"))
        .expect("cycle runs");

    assert_eq!(outcome.alerts_sent, 0);
    assert!(transport.sent.borrow().is_empty());
    assert!(!history_path.exists());
}
