//! Application loops
//!
//! [`Monitor`] owns the parsed aggregates and configuration and runs one of
//! two mutually exclusive, single-threaded modes:
//!
//! - interactive: render a frame, block with timeout on keyboard input,
//!   apply the transition, repeat until the quit key;
//! - headless: run one alert-evaluation cycle over all devices, sleep for
//!   the refresh interval, repeat indefinitely.
//!
//! Log parsing is one-shot and blocking at construction; a running process
//! never observes records appended after its own start.

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{error, info};

use crate::aggregate::DeviceAggregates;
use crate::alert::{AlertEngine, AlertTransport};
use crate::config::MonitorConfig;
use crate::ingest::read_log;
use crate::render::DashboardRenderer;
use crate::session::{build_view, InputSource, Session, Transition};

pub struct Monitor {
    config: MonitorConfig,
    aggregates: DeviceAggregates,
}

impl Monitor {
    /// Parse the health log and build the per-device aggregates.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let records = read_log(&config.monitor.log_file)
            .with_context(|| format!("parsing {}", config.monitor.log_file.display()))?;
        info!(
            records = records.len(),
            log_file = %config.monitor.log_file.display(),
            "health log parsed"
        );
        let aggregates = DeviceAggregates::from_records(records);
        Ok(Self { config, aggregates })
    }

    /// Build from already-computed aggregates. Used by tests to run loops
    /// against synthetic data without a log file.
    pub fn from_parts(config: MonitorConfig, aggregates: DeviceAggregates) -> Self {
        Self { config, aggregates }
    }

    pub fn aggregates(&self) -> &DeviceAggregates {
        &self.aggregates
    }

    /// Interactive dashboard loop. Returns Ok(()) on the quit key; any
    /// renderer or input failure terminates without recovery.
    pub fn run_interactive<I, R, T>(
        &self,
        input: &mut I,
        renderer: &mut R,
        transport: &T,
    ) -> Result<()>
    where
        I: InputSource,
        R: DashboardRenderer,
        T: AlertTransport + ?Sized,
    {
        if self.aggregates.is_empty() {
            bail!(
                "no devices in {} - nothing to display",
                self.config.monitor.log_file.display()
            );
        }

        let mut session = Session::new(self.aggregates.device_names());
        let refresh = self.config.monitor.refresh_interval();
        let alerts_enabled = self.config.alert_settings.alerts_enabled;

        loop {
            let today = Local::now().date_naive();
            if let Some(view) = build_view(&session, &self.aggregates, today) {
                renderer.render(&view, &session).context("rendering dashboard")?;
            }

            let key = input.read_key(refresh).context("reading keyboard input")?;
            match session.handle_key(key) {
                Transition::Quit => return Ok(()),
                Transition::AlertCycle => {
                    if alerts_enabled {
                        self.run_alert_cycle(transport);
                    }
                }
                Transition::Redisplay | Transition::NextDevice => {}
            }
        }
    }

    /// Headless alert loop: evaluate all devices, sleep, repeat. Failures
    /// within a cycle are logged, never fatal - the loop runs until the
    /// process is terminated externally.
    pub fn run_headless<T: AlertTransport + ?Sized>(&self, transport: &T) -> Result<()> {
        info!("running in headless mode - alert loop only");
        let refresh = self.config.monitor.refresh_interval();
        loop {
            self.run_alert_cycle(transport);
            std::thread::sleep(refresh);
        }
    }

    /// One full alert-evaluation cycle over all devices.
    fn run_alert_cycle<T: AlertTransport + ?Sized>(&self, transport: &T) {
        let engine = AlertEngine::new(
            &self.config.alert_thresholds,
            &self.config.alert_settings,
            transport,
        );
        let now = Local::now().naive_local();
        match engine.run_cycle(
            &self.aggregates,
            &self.config.alert_settings.history_file,
            now,
        ) {
            Ok(outcome) => {
                if outcome.alerts_sent > 0 || outcome.send_failures > 0 {
                    info!(
                        sent = outcome.alerts_sent,
                        failed = outcome.send_failures,
                        "alert cycle finished"
                    );
                }
            }
            Err(e) => error!(error = %e, "alert cycle aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::HealthRecord;
    use crate::render::PlainRenderer;
    use crate::session::Key;
    use crate::alert::TransportError;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::time::Duration;

    fn ts(time: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .expect("valid date")
            .and_time(time.parse().expect("valid time"))
    }

    fn aggregates() -> DeviceAggregates {
        DeviceAggregates::from_records(vec![HealthRecord {
            device: "/dev/nvme0n1".to_string(),
            timestamp: ts("10:00:00"),
            mean_temperature: 45.0,
            sensor_temps: vec![],
            power_on_hours: 100,
            unsafe_shutdowns: 0,
            media_errors: 0,
            num_err_log_entries: 0,
            percentage_used: 1,
            health_score: 99,
        }])
    }

    struct NullTransport;
    impl AlertTransport for NullTransport {
        fn send(&self, _: &str, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Replays a fixed key script, then quits.
    struct ScriptedInput {
        keys: Vec<Key>,
        pos: usize,
    }

    impl InputSource for ScriptedInput {
        fn read_key(&mut self, _timeout: Duration) -> std::io::Result<Key> {
            let key = self.keys.get(self.pos).copied().unwrap_or(Key::Char('q'));
            self.pos += 1;
            Ok(key)
        }
    }

    #[test]
    fn interactive_loop_exits_on_quit_key() {
        let monitor = Monitor::from_parts(MonitorConfig::default(), aggregates());
        let mut input = ScriptedInput {
            keys: vec![Key::Char('s'), Key::Tab, Key::Other, Key::Char('q')],
            pos: 0,
        };
        let mut renderer = PlainRenderer::new(Vec::new());

        monitor
            .run_interactive(&mut input, &mut renderer, &NullTransport)
            .expect("loop exits cleanly");
        assert_eq!(input.pos, 4);
    }

    #[test]
    fn interactive_loop_rejects_empty_log() {
        let monitor = Monitor::from_parts(MonitorConfig::default(), DeviceAggregates::default());
        let mut input = ScriptedInput { keys: vec![], pos: 0 };
        let mut renderer = PlainRenderer::new(Vec::new());

        let err = monitor
            .run_interactive(&mut input, &mut renderer, &NullTransport)
            .expect_err("no devices");
        assert!(err.to_string().contains("no devices"));
    }
}
