//! Interactive session navigation
//!
//! State machine driving the terminal dashboard: a cyclic cursor over the
//! ordered device list plus three toggleable display options, advanced by one
//! timed key read per frame. A read timeout is a defined signal (run the
//! alert-check branch), not an error.
//!
//! The view-model computation (histogram sorting and scope filtering) lives
//! here too; glyph-level rendering is a separate concern behind
//! [`crate::render::DashboardRenderer`].

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::aggregate::{DeviceAggregates, TemperatureSummary};
use crate::ingest::{display_name, HealthRecord, DATE_FORMAT};

/// Histogram buckets at or above this temperature are "yellow" (deg C).
pub const YELLOW_THRESHOLD_C: i32 = 60;
/// Histogram buckets at or above this temperature are "red" (deg C).
pub const RED_THRESHOLD_C: i32 = 70;

/// Histogram ordering, cycled with the `s` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Temperature,
    LastOccurrence,
    Count,
}

impl SortKey {
    pub fn next(self) -> Self {
        match self {
            Self::Temperature => Self::LastOccurrence,
            Self::LastOccurrence => Self::Count,
            Self::Count => Self::Temperature,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::LastOccurrence => "Last Occurrence",
            Self::Count => "Count",
        }
    }
}

/// Which histogram rows are shown, cycled with the `r` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsScope {
    Top5,
    All,
    /// Buckets at or above [`YELLOW_THRESHOLD_C`].
    Yellow,
    /// Buckets at or above [`RED_THRESHOLD_C`].
    Red,
}

impl ResultsScope {
    pub fn next(self) -> Self {
        match self {
            Self::Top5 => Self::All,
            Self::All => Self::Yellow,
            Self::Yellow => Self::Red,
            Self::Red => Self::Top5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Top5 => "top 5",
            Self::All => "all",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// Timestamp rendering, toggled with the `t` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDisplay {
    Date,
    DateTime,
}

impl DateDisplay {
    pub fn toggle(self) -> Self {
        match self {
            Self::Date => Self::DateTime,
            Self::DateTime => Self::Date,
        }
    }

    pub fn format(self, dt: NaiveDateTime) -> String {
        match self {
            Self::Date => dt.format("%Y-%m-%d").to_string(),
            Self::DateTime => dt.format(DATE_FORMAT).to_string(),
        }
    }
}

/// One decoded keyboard read. `Timeout` means no key arrived before the
/// deadline and drives the alert-check branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Tab,
    Timeout,
    Other,
}

/// Cancellable read-with-deadline over keyboard input. Substitutable with a
/// scripted double in tests.
pub trait InputSource {
    fn read_key(&mut self, timeout: Duration) -> std::io::Result<Key>;
}

/// What the application loop should do after a key was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Terminate with exit code 0.
    Quit,
    /// Redisplay the same device (display option changed or no-op key).
    Redisplay,
    /// The cursor advanced; display the next device.
    NextDevice,
    /// No key arrived: run one alert-evaluation cycle, then redisplay.
    AlertCycle,
}

/// Navigator state: cyclic device cursor plus display options.
#[derive(Debug, Clone)]
pub struct Session {
    devices: Vec<String>,
    index: usize,
    pub sort_key: SortKey,
    pub results_scope: ResultsScope,
    pub date_display: DateDisplay,
}

impl Session {
    /// Initial state: first device, sort by temperature, top-5 scope,
    /// date-only display.
    pub fn new(devices: Vec<String>) -> Self {
        Self {
            devices,
            index: 0,
            sort_key: SortKey::Temperature,
            results_scope: ResultsScope::Top5,
            date_display: DateDisplay::Date,
        }
    }

    pub fn current_device(&self) -> Option<&str> {
        self.devices.get(self.index).map(String::as_str)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Apply one key to the navigator state.
    pub fn handle_key(&mut self, key: Key) -> Transition {
        match key {
            Key::Char('q') => Transition::Quit,
            Key::Char('s') => {
                self.sort_key = self.sort_key.next();
                Transition::Redisplay
            }
            Key::Char('r') => {
                self.results_scope = self.results_scope.next();
                Transition::Redisplay
            }
            Key::Char('t') => {
                self.date_display = self.date_display.toggle();
                Transition::Redisplay
            }
            Key::Tab => {
                if !self.devices.is_empty() {
                    self.index = (self.index + 1) % self.devices.len();
                }
                Transition::NextDevice
            }
            Key::Timeout => Transition::AlertCycle,
            Key::Char(_) | Key::Other => Transition::Redisplay,
        }
    }
}

/// Bucket severity classification for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Green,
    Yellow,
    Red,
}

impl Severity {
    pub fn classify(temp_c: i32) -> Self {
        if temp_c >= RED_THRESHOLD_C {
            Self::Red
        } else if temp_c >= YELLOW_THRESHOLD_C {
            Self::Yellow
        } else {
            Self::Green
        }
    }
}

/// One histogram row, already sorted and scoped.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRow {
    pub temp_c: i32,
    pub count: u64,
    pub last_date: NaiveDateTime,
    pub severity: Severity,
}

/// Everything the renderer needs to draw one device's dashboard frame.
#[derive(Debug, Clone)]
pub struct DeviceView {
    pub device: String,
    pub display_name: String,
    /// Days of log coverage, counting the start day itself.
    pub num_days: i64,
    pub summary: TemperatureSummary,
    pub health: HealthRecord,
    pub rows: Vec<HistogramRow>,
}

/// Build the frame for the session's current device: histogram sorted
/// descending by the active sort key, then narrowed to the active scope.
pub fn build_view(
    session: &Session,
    aggregates: &DeviceAggregates,
    today: NaiveDate,
) -> Option<DeviceView> {
    let device = session.current_device()?;
    let aggregate = aggregates.get(device)?;

    let mut rows: Vec<HistogramRow> = aggregate
        .histogram
        .iter()
        .map(|(&temp_c, bucket)| HistogramRow {
            temp_c,
            count: bucket.count,
            last_date: bucket.last_date,
            severity: Severity::classify(temp_c),
        })
        .collect();

    match session.sort_key {
        SortKey::Temperature => rows.sort_by(|a, b| b.temp_c.cmp(&a.temp_c)),
        SortKey::LastOccurrence => rows.sort_by(|a, b| b.last_date.cmp(&a.last_date)),
        SortKey::Count => rows.sort_by(|a, b| b.count.cmp(&a.count)),
    }

    match session.results_scope {
        ResultsScope::Top5 => rows.truncate(5),
        ResultsScope::All => {}
        ResultsScope::Yellow => rows.retain(|r| r.temp_c >= YELLOW_THRESHOLD_C),
        ResultsScope::Red => rows.retain(|r| r.temp_c >= RED_THRESHOLD_C),
    }

    let num_days = (today - aggregate.summary.start_date.date()).num_days() + 1;

    Some(DeviceView {
        device: device.to_string(),
        display_name: display_name(device).to_string(),
        num_days,
        summary: aggregate.summary.clone(),
        health: aggregate.health.clone(),
        rows,
    })
}
