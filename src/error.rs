//! Error taxonomy for configuration, session control, sensors and export.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Rejected test parameters. Raised before any session state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field}: '{value}' is not a valid integer")]
    InvalidInteger { field: &'static str, value: String },

    #[error("{field}: {value} is outside the accepted range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("duration must be greater than zero (got {0} s)")]
    NonPositiveDuration(i64),

    #[error("pulsed profile needs a non-zero cycle time (on + off)")]
    ZeroPulseCycle,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a stress test is already running")]
    AlreadyRunning,

    #[error("markers can only be added during a test")]
    NotRunning,

    #[error("marker label must not be empty")]
    EmptyMarker,

    #[error("failed to spawn load worker for core {core}: {source}")]
    WorkerSpawn {
        core: usize,
        #[source]
        source: io::Error,
    },

    #[error("session controller thread has exited")]
    ControllerGone,
}

/// Sensor read failures. Never escape the sampling layer.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected contents in {}: '{raw}'", path.display())]
    Parse { path: PathBuf, raw: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no data has been recorded to export")]
    NoData,

    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
