//! Live CPU utilization and temperature readings.
//!
//! Utilization comes from `sysinfo`; temperatures are read straight from
//! sysfs (`hwmon` first, `thermal_zone*` as fallback) in millidegrees.

use std::{
    fs,
    path::{Path, PathBuf},
};

use sysinfo::System;

use crate::config::{HWMON_ROOT, THERMAL_ROOT};

pub trait SensorSource: Send {
    fn current_cpu_load_percent(&mut self) -> f32;
    /// Every temperature the host exposes, in °C. May be empty.
    fn current_temperature_readings(&mut self) -> Vec<f32>;
}

/// Hottest finite reading, or `None` when nothing was reported.
pub fn hottest(readings: &[f32]) -> Option<f32> {
    readings
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .fold(None, |max, t| Some(max.map_or(t, |m: f32| m.max(t))))
}

#[derive(Debug, Clone)]
pub struct ThermalProbe {
    hwmon_root: PathBuf,
    thermal_root: PathBuf,
}

impl Default for ThermalProbe {
    fn default() -> Self {
        Self::new(HWMON_ROOT, THERMAL_ROOT)
    }
}

impl ThermalProbe {
    pub fn new(hwmon_root: impl Into<PathBuf>, thermal_root: impl Into<PathBuf>) -> Self {
        Self {
            hwmon_root: hwmon_root.into(),
            thermal_root: thermal_root.into(),
        }
    }

    pub fn readings(&self) -> Vec<f32> {
        let hwmon = read_hwmon(&self.hwmon_root);
        if !hwmon.is_empty() {
            return hwmon;
        }
        read_thermal_zones(&self.thermal_root)
    }
}

fn read_millidegrees(path: &Path) -> Option<f32> {
    let raw = fs::read_to_string(path).ok()?;
    let milli = raw.trim().parse::<i64>().ok()?;
    Some(milli as f32 / 1000.0)
}

fn read_hwmon(root: &Path) -> Vec<f32> {
    let Ok(devices) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut temps = Vec::new();
    for device in devices.flatten() {
        let Ok(files) = fs::read_dir(device.path()) else {
            continue;
        };
        for file in files.flatten() {
            let name = file.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("temp") && name.ends_with("_input") {
                if let Some(t) = read_millidegrees(&file.path()) {
                    temps.push(t);
                }
            }
        }
    }
    temps
}

fn read_thermal_zones(root: &Path) -> Vec<f32> {
    let Ok(zones) = fs::read_dir(root) else {
        return Vec::new();
    };

    zones
        .flatten()
        .filter(|z| z.file_name().to_string_lossy().starts_with("thermal_zone"))
        .filter_map(|z| read_millidegrees(&z.path().join("temp")))
        .collect()
}

/// Host-backed sensors.
pub struct HostSensors {
    system: System,
    thermal: ThermalProbe,
}

impl HostSensors {
    pub fn new() -> Self {
        Self::with_thermal(ThermalProbe::default())
    }

    pub fn with_thermal(thermal: ThermalProbe) -> Self {
        let mut system = System::new();
        // First refresh only seeds the usage delta.
        system.refresh_cpu_usage();
        Self { system, thermal }
    }
}

impl Default for HostSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for HostSensors {
    fn current_cpu_load_percent(&mut self) -> f32 {
        self.system.refresh_cpu_usage();
        self.system.global_cpu_usage()
    }

    fn current_temperature_readings(&mut self) -> Vec<f32> {
        self.thermal.readings()
    }
}
