//! Telemetry records, event markers and the shared session log.
//!
//! The controller thread is the only writer; UI/export readers take
//! snapshots through the `RwLock`. Everything is cleared when a new
//! session starts.

use std::{fmt, sync::Arc};

use chrono::Local;
use parking_lot::RwLock;
use serde::Serialize;

use crate::telemetry::power::PowerReading;

/// One per-second snapshot. `None` means "no data", never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub elapsed_seconds: u64,
    pub load_percent: f64,
    pub temperature_celsius: Option<f64>,
    pub power_watts: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventMarker {
    pub elapsed_seconds: u64,
    pub label: String,
}

/// Wall-clock stamped session event, e.g. `[14:02:11] Stress test stopped.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub wall_clock: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.wall_clock, self.message)
    }
}

#[derive(Debug, Default, Clone)]
pub struct TelemetryLog {
    records: Vec<TelemetryRecord>,
    markers: Vec<EventMarker>,
    events: Vec<LogEntry>,
    power_status: Option<PowerReading>,
}

pub type SharedTelemetry = Arc<RwLock<TelemetryLog>>;

impl TelemetryLog {
    pub fn shared() -> SharedTelemetry {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.markers.clear();
        self.events.clear();
        self.power_status = None;
    }

    /// Appends a record. Records must arrive in strictly increasing
    /// `elapsed_seconds`; out-of-order records are dropped.
    pub fn push_record(&mut self, record: TelemetryRecord) -> bool {
        if let Some(last) = self.records.last() {
            if record.elapsed_seconds <= last.elapsed_seconds {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn set_power_status(&mut self, reading: PowerReading) {
        self.power_status = Some(reading);
    }

    pub fn add_marker(&mut self, label: impl Into<String>) -> &EventMarker {
        let elapsed_seconds = self.elapsed_seconds();
        self.markers.push(EventMarker {
            elapsed_seconds,
            label: label.into(),
        });
        &self.markers[self.markers.len() - 1]
    }

    pub fn log_event(&mut self, message: impl Into<String>) {
        self.events.push(LogEntry {
            wall_clock: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        });
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn markers(&self) -> &[EventMarker] {
        &self.markers
    }

    pub fn events(&self) -> &[LogEntry] {
        &self.events
    }

    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.records.last()
    }

    /// Seconds covered by the records so far.
    pub fn elapsed_seconds(&self) -> u64 {
        self.records.last().map_or(0, |r| r.elapsed_seconds)
    }

    /// Trailing `n` records for plotting.
    pub fn display_window(&self, n: usize) -> &[TelemetryRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    pub fn power_label(&self) -> String {
        self.power_status
            .map_or_else(|| "...".to_string(), |p| p.label())
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        let load = calculate_stats(self.records.iter().map(|r| r.load_percent))?;
        let temperature =
            calculate_stats(self.records.iter().filter_map(|r| r.temperature_celsius));
        let power = calculate_stats(self.records.iter().filter_map(|r| r.power_watts));
        Some(SessionSummary {
            samples: self.records.len(),
            load,
            temperature,
            power,
            markers: self.markers.len(),
        })
    }
}

pub fn load_label(load_percent: f64) -> String {
    format!("{:.1} %", load_percent)
}

pub fn temperature_label(temperature: Option<f64>) -> String {
    temperature.map_or_else(|| "N/A".to_string(), |t| format!("{:.1} °C", t))
}

/// Statistics summary for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// Computes min, max, mean; `None` for an empty series.
pub fn calculate_stats(data: impl IntoIterator<Item = f64>) -> Option<Stats> {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for x in data {
        count += 1;
        min = min.min(x);
        max = max.max(x);
        sum += x;
    }

    if count == 0 {
        return None;
    }
    Some(Stats {
        min,
        max,
        mean: sum / count as f64,
        count,
    })
}

/// Whole-run aggregate printed after a test and exported alongside the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub samples: usize,
    pub load: Stats,
    pub temperature: Option<Stats>,
    pub power: Option<Stats>,
    pub markers: usize,
}
