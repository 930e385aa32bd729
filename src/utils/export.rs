//! CSV export of a finished (or running) test.
//!
//! Layout of the data file:
//! - `Time (s),CPU Load (%),Temperature (C),Power (W)` header, one row per record,
//!   two decimals, absent values as `N/A`.
//! - If markers exist: a blank row, `--- Event Markers ---`, `Time (s),Event`,
//!   then one `elapsed,label` row per marker.
//!
//! Rows end in CRLF. Rendering is pure: the same records and markers always
//! produce the same bytes.

use std::{fs, path::Path};

use chrono::{DateTime, Local};
use csv::{Terminator, Writer, WriterBuilder};
use log::info;
use serde::Serialize;

use crate::error::ExportError;
use crate::utils::metrics::{EventMarker, SessionSummary, Stats, TelemetryLog, TelemetryRecord};

pub const DATA_HEADER: [&str; 4] = ["Time (s)", "CPU Load (%)", "Temperature (C)", "Power (W)"];
pub const MARKER_SECTION: &str = "--- Event Markers ---";
pub const MARKER_HEADER: [&str; 2] = ["Time (s)", "Event"];
pub const NOT_AVAILABLE: &str = "N/A";
const LINE_END: &[u8] = b"\r\n";

fn csv_writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.2}", v))
}

/// Renders records and markers into CSV bytes.
pub fn render_csv(
    records: &[TelemetryRecord],
    markers: &[EventMarker],
) -> Result<Vec<u8>, ExportError> {
    let mut data = csv_writer();
    data.write_record(DATA_HEADER)?;
    for r in records {
        data.write_record([
            r.elapsed_seconds.to_string(),
            format!("{:.2}", r.load_percent),
            optional(r.temperature_celsius),
            optional(r.power_watts),
        ])?;
    }
    let mut out = finish(data)?;

    if !markers.is_empty() {
        out.extend_from_slice(LINE_END);
        let mut section = csv_writer();
        section.write_record([MARKER_SECTION])?;
        section.write_record(MARKER_HEADER)?;
        for m in markers {
            section.write_record([m.elapsed_seconds.to_string(), m.label.clone()])?;
        }
        out.extend(finish(section)?);
    }

    Ok(out)
}

/// Writes the log's records and markers to `path`. Refuses an empty log.
pub fn export_csv(path: &Path, log: &TelemetryLog) -> Result<(), ExportError> {
    if log.records().is_empty() {
        return Err(ExportError::NoData);
    }
    let bytes = render_csv(log.records(), log.markers())?;
    fs::write(path, bytes)?;
    info!(
        "[Export] {} records, {} markers written to {}",
        log.records().len(),
        log.markers().len(),
        path.display()
    );
    Ok(())
}

/// `cpu_stress_test_YYYYmmdd_HHMMSS.csv`
pub fn default_export_filename(now: DateTime<Local>) -> String {
    format!("cpu_stress_test_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    metric: &'static str,
    value: String,
    description: &'static str,
}

fn stats_rows(
    rows: &mut Vec<SummaryRow>,
    prefix: &'static [&'static str; 3],
    stats: Option<Stats>,
) {
    let values = stats.map(|s| [s.min, s.max, s.mean]);
    for (i, metric) in prefix.iter().enumerate() {
        rows.push(SummaryRow {
            metric: *metric,
            value: optional(values.map(|v| v[i])),
            description: ["Minimum", "Maximum", "Average"][i],
        });
    }
}

/// Renders the run summary as `metric,value,description` rows.
pub fn render_summary_csv(summary: &SessionSummary) -> Result<Vec<u8>, ExportError> {
    let mut rows = vec![SummaryRow {
        metric: "samples",
        value: summary.samples.to_string(),
        description: "Telemetry records",
    }];
    stats_rows(&mut rows, &["load_min_pct", "load_max_pct", "load_avg_pct"], Some(summary.load));
    stats_rows(&mut rows, &["temp_min_c", "temp_max_c", "temp_avg_c"], summary.temperature);
    stats_rows(&mut rows, &["power_min_w", "power_max_w", "power_avg_w"], summary.power);
    rows.push(SummaryRow {
        metric: "markers",
        value: summary.markers.to_string(),
        description: "Event markers",
    });

    let mut writer = csv_writer();
    for row in &rows {
        writer.serialize(row)?;
    }
    finish(writer)
}

pub fn export_summary_csv(path: &Path, summary: &SessionSummary) -> Result<(), ExportError> {
    fs::write(path, render_summary_csv(summary)?)?;
    info!("[Export] summary written to {}", path.display());
    Ok(())
}
