//! # CPU Stress Monitor
//!
//! Synthesizes a controllable CPU load on every logical core while sampling
//! load, temperature and package power once per second.
//!
//! ## Layout
//! - [`load`]: shared load target, duty-cycle workers, load profiles.
//! - [`telemetry`]: host sensors, RAPL power derivation, the per-second sampler.
//! - [`session`]: parameter validation, the timer-driven session controller and its thread.
//! - [`utils`]: the telemetry log, summaries and CSV export.

pub mod config;
pub mod error;
pub mod load;
pub mod session;
pub mod telemetry;
pub mod utils;
