//! Package power derived from a monotonically increasing energy counter.
//!
//! Power (W) = ΔE (µJ) / 1e6 / Δt (s). Counter wraparound is corrected by
//! adding the counter's max range to a negative delta. Any failure to read
//! the counter disables sampling for the rest of the run.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{info, warn};

use crate::config::POWERCAP_ROOT;
use crate::error::SensorError;

pub trait EnergySource: Send {
    fn current_energy_micro_joules(&mut self) -> Result<u64, SensorError>;
    fn max_energy_range_micro_joules(&mut self) -> Result<u64, SensorError>;
}

/// Intel RAPL `package-0` zone exposed through the powercap sysfs class.
#[derive(Debug, Clone)]
pub struct RaplEnergySource {
    energy_path: PathBuf,
    max_range_path: PathBuf,
}

impl RaplEnergySource {
    pub fn discover() -> Option<Self> {
        Self::discover_in(Path::new(POWERCAP_ROOT))
    }

    /// Scans `root` for an `intel-rapl*` zone named `package-0` that exposes
    /// both `energy_uj` and `max_energy_range_uj`.
    pub fn discover_in(root: &Path) -> Option<Self> {
        let entries = fs::read_dir(root).ok()?;
        let mut zones: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains("intel-rapl"))
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        zones.sort();

        for zone in zones {
            let Ok(name) = fs::read_to_string(zone.join("name")) else {
                continue;
            };
            if name.trim() != "package-0" {
                continue;
            }

            let energy_path = zone.join("energy_uj");
            let max_range_path = zone.join("max_energy_range_uj");
            if energy_path.exists() && max_range_path.exists() {
                info!("[Power] package-0 energy counter at {}", energy_path.display());
                return Some(Self {
                    energy_path,
                    max_range_path,
                });
            }
        }
        None
    }

    pub fn energy_path(&self) -> &Path {
        &self.energy_path
    }
}

impl EnergySource for RaplEnergySource {
    fn current_energy_micro_joules(&mut self) -> Result<u64, SensorError> {
        read_counter(&self.energy_path)
    }

    fn max_energy_range_micro_joules(&mut self) -> Result<u64, SensorError> {
        read_counter(&self.max_range_path)
    }
}

fn read_counter(path: &Path) -> Result<u64, SensorError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    raw.trim().parse::<u64>().map_err(|_| SensorError::Parse {
        path: path.to_path_buf(),
        raw: raw.trim().to_string(),
    })
}

/// Result of one power sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerReading {
    Watts(f64),
    /// First reading of a run; no delta yet.
    WarmingUp,
    /// No time elapsed, or a wrap with unknown max range.
    Skipped,
    /// The counter failed on this sample; sampling is now disabled.
    AccessError,
    NoSensor,
}

impl PowerReading {
    pub fn watts(&self) -> Option<f64> {
        match *self {
            PowerReading::Watts(w) => Some(w),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            PowerReading::Watts(w) => format!("{:.2} W", w),
            PowerReading::WarmingUp | PowerReading::Skipped => "...".to_string(),
            PowerReading::AccessError => "N/A (Access Error)".to_string(),
            PowerReading::NoSensor => "N/A (No Sensor)".to_string(),
        }
    }
}

/// Energy delta in µJ, corrected for a single counter wrap.
#[inline]
pub fn energy_delta(last_uj: u64, current_uj: u64, max_range_uj: u64) -> i128 {
    let mut delta = current_uj as i128 - last_uj as i128;
    if delta < 0 {
        delta += max_range_uj as i128;
    }
    delta
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyCounterState {
    pub last_value_uj: u64,
    pub last_timestamp: Option<Instant>,
    /// 0 until read; stays 0 if the range file could not be read.
    pub max_range_uj: u64,
}

impl EnergyCounterState {
    /// Folds a new counter reading into the state and derives power.
    pub fn advance(&mut self, current_uj: u64, now: Instant) -> PowerReading {
        let reading = match self.last_timestamp {
            None => PowerReading::WarmingUp,
            Some(last_ts) => {
                let delta_uj = energy_delta(self.last_value_uj, current_uj, self.max_range_uj);
                let delta_s = now.saturating_duration_since(last_ts).as_secs_f64();
                if delta_uj < 0 || delta_s <= 0.0 {
                    PowerReading::Skipped
                } else {
                    PowerReading::Watts((delta_uj as f64 / 1e6) / delta_s)
                }
            }
        };

        self.last_value_uj = current_uj;
        self.last_timestamp = Some(now);
        reading
    }
}

pub struct PowerSampler {
    source: Option<Box<dyn EnergySource>>,
    /// Cleared by a failed counter read; restored when the next run resets.
    enabled: bool,
    state: EnergyCounterState,
    max_range_probed: bool,
}

impl PowerSampler {
    pub fn new(source: Option<Box<dyn EnergySource>>) -> Self {
        Self {
            source,
            enabled: true,
            state: EnergyCounterState::default(),
            max_range_probed: false,
        }
    }

    /// Probes the host's powercap tree once.
    pub fn discover() -> Self {
        let source = RaplEnergySource::discover();
        if source.is_none() {
            info!("[Power] no package energy counter found; power reporting disabled");
        }
        Self::new(source.map(|s| Box::new(s) as Box<dyn EnergySource>))
    }

    /// True while a counter exists and has not failed during this run.
    pub fn is_available(&self) -> bool {
        self.source.is_some() && self.enabled
    }

    pub fn state(&self) -> &EnergyCounterState {
        &self.state
    }

    /// Starts a new run: forgets the previous reading so the next sample
    /// starts a new delta, and re-enables a counter that failed last run.
    pub fn reset(&mut self) {
        self.state.last_value_uj = 0;
        self.state.last_timestamp = None;
        self.enabled = true;
    }

    pub fn sample(&mut self, now: Instant) -> PowerReading {
        let Some(source) = self.source.as_mut() else {
            return PowerReading::NoSensor;
        };
        if !self.enabled {
            return PowerReading::AccessError;
        }

        if !self.max_range_probed {
            self.max_range_probed = true;
            match source.max_energy_range_micro_joules() {
                Ok(max) => self.state.max_range_uj = max,
                Err(e) => {
                    warn!("[Power] max energy range unavailable, wraps will be skipped: {}", e)
                }
            }
        }

        match source.current_energy_micro_joules() {
            Ok(current) => self.state.advance(current, now),
            Err(e) => {
                warn!("[Power] disabling power sampling for this run: {}", e);
                self.enabled = false;
                PowerReading::AccessError
            }
        }
    }
}
