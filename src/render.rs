//! Dashboard rendering seam
//!
//! Box-drawing and color belong to an external renderer; this module only
//! defines the seam and a plain-text implementation good enough for a raw
//! terminal. Lines end with `\r\n` because the terminal is in raw mode while
//! a frame is on screen.

use std::io::Write;

use crate::session::{DeviceView, Session};

/// Clear screen and home the cursor.
const CLEAR: &str = "\x1b[H\x1b[2J";

const CONTROLS: &str =
    "Control keys: tab: next device, s: histogram sort, r: histogram results, t: date-time format, q: quit";

/// Draws one dashboard frame for the session's current device.
pub trait DashboardRenderer {
    fn render(&mut self, view: &DeviceView, session: &Session) -> std::io::Result<()>;
}

/// Plain-text renderer writing ANSI-cleared frames to any writer.
pub struct PlainRenderer<W: Write> {
    out: W,
}

impl PlainRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> PlainRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> DashboardRenderer for PlainRenderer<W> {
    fn render(&mut self, view: &DeviceView, session: &Session) -> std::io::Result<()> {
        let out = &mut self.out;
        write!(out, "{CLEAR}")?;

        let plural = if view.num_days == 1 { "" } else { "s" };
        write!(out, "Device: {}\r\n", view.display_name)?;
        write!(
            out,
            "Log Data: {} day{plural}, beginning {}\r\n\r\n",
            view.num_days,
            view.summary.start_date.date()
        )?;

        write!(out, "Disk Health Info\r\n")?;
        let h = &view.health;
        write!(out, "  power_on_hours: {}\r\n", h.power_on_hours)?;
        write!(out, "  unsafe_shutdowns: {}\r\n", h.unsafe_shutdowns)?;
        write!(out, "  media_errors: {}\r\n", h.media_errors)?;
        write!(out, "  num_err_log_entries: {}\r\n", h.num_err_log_entries)?;
        write!(out, "  percentage_used: {}\r\n", h.percentage_used)?;
        write!(out, "  health_score: {}\r\n\r\n", h.health_score)?;

        let s = &view.summary;
        write!(out, "Summary Temperature Info (mean of all sensor readings)\r\n")?;
        write!(out, "  Min temp: {}\r\n", s.min)?;
        write!(out, "  Max temp: {}\r\n", s.max)?;
        write!(
            out,
            "  Max temp datetime: {}\r\n",
            session.date_display.format(s.max_date)
        )?;
        write!(out, "  Mean temp: {}\r\n", s.mean)?;
        write!(out, "  Median temp: {}\r\n", s.median)?;
        write!(
            out,
            "  Sample interval (current/median): {}/{} sec\r\n\r\n",
            s.current_sample_interval, s.median_sample_interval
        )?;

        write!(
            out,
            "Temperature Histogram (sort: {}, results: {})\r\n",
            session.sort_key.label(),
            session.results_scope.label()
        )?;
        write!(out, "  Temp | Count | Last Occurrence\r\n")?;
        for row in &view.rows {
            write!(
                out,
                "  {:>4} | {:>5} | {}\r\n",
                row.temp_c,
                row.count,
                session.date_display.format(row.last_date)
            )?;
        }

        write!(out, "\r\n{CONTROLS}\r\n")?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DeviceAggregates;
    use crate::ingest::HealthRecord;
    use crate::session::{build_view, Session};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(time: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .expect("valid date")
            .and_time(time.parse().expect("valid time"))
    }

    #[test]
    fn frame_contains_all_sections() {
        let aggregates = DeviceAggregates::from_records(vec![HealthRecord {
            device: "/dev/nvme0n1".to_string(),
            timestamp: ts("10:00:00"),
            mean_temperature: 45.0,
            sensor_temps: vec![],
            power_on_hours: 100,
            unsafe_shutdowns: 0,
            media_errors: 2,
            num_err_log_entries: 0,
            percentage_used: 1,
            health_score: 96,
        }]);
        let session = Session::new(vec!["/dev/nvme0n1".to_string()]);
        let view = build_view(&session, &aggregates, ts("12:00:00").date()).expect("view");

        let mut buf = Vec::new();
        PlainRenderer::new(&mut buf)
            .render(&view, &session)
            .expect("render");
        let frame = String::from_utf8(buf).expect("utf8");

        assert!(frame.contains("Device: nvme0n1"));
        assert!(frame.contains("media_errors: 2"));
        assert!(frame.contains("health_score: 96"));
        assert!(frame.contains("  45 |     1 | 2024-03-01"));
        assert!(frame.contains("q: quit"));
    }
}
