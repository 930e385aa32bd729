//! Once-per-second telemetry: CPU load, hottest temperature, package power.

use std::time::Instant;

use crate::telemetry::{
    power::{PowerReading, PowerSampler},
    sensors::{HostSensors, SensorSource, hottest},
};
use crate::utils::metrics::TelemetryRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub record: TelemetryRecord,
    pub power: PowerReading,
}

pub struct TelemetrySampler {
    sensors: Box<dyn SensorSource>,
    power: PowerSampler,
    elapsed_seconds: u64,
}

impl TelemetrySampler {
    pub fn new(sensors: Box<dyn SensorSource>, power: PowerSampler) -> Self {
        Self {
            sensors,
            power,
            elapsed_seconds: 0,
        }
    }

    /// Host sensors plus a one-time energy counter probe.
    pub fn host() -> Self {
        Self::new(Box::new(HostSensors::new()), PowerSampler::discover())
    }

    /// Starts a fresh run: the counter restarts at zero and the load and
    /// energy baselines are re-seeded so the first record has deltas.
    /// Returns the baseline power reading.
    pub fn prime(&mut self, now: Instant) -> PowerReading {
        self.elapsed_seconds = 0;
        self.power.reset();
        self.sensors.current_cpu_load_percent();
        self.power.sample(now)
    }

    pub fn sample(&mut self, now: Instant) -> TelemetrySample {
        let load_percent = f64::from(self.sensors.current_cpu_load_percent());
        let temperature_celsius =
            hottest(&self.sensors.current_temperature_readings()).map(f64::from);
        let power = self.power.sample(now);

        self.elapsed_seconds += 1;
        TelemetrySample {
            record: TelemetryRecord {
                elapsed_seconds: self.elapsed_seconds,
                load_percent,
                temperature_celsius,
                power_watts: power.watts(),
            },
            power,
        }
    }
}
