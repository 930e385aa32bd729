//! Defaults for load generation, telemetry sampling and session control.
//!
//! Timing constants follow the stress tool's original behaviour:
//! - 50 ms duty-cycle control period per worker
//! - 250 ms profile recomputation tick
//! - 1 s telemetry tick
//! - 1 s bounded wait per worker on stop

use std::time::Duration;

pub const CONTROL_PERIOD: Duration = Duration::from_millis(50);
pub const PROFILE_TICK: Duration = Duration::from_millis(250);
pub const TELEMETRY_TICK: Duration = Duration::from_secs(1);
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound accepted for a test duration (one week).
pub const MAX_DURATION_SECS: i64 = 7 * 24 * 3600;
/// Upper bound accepted for a single pulsed on/off phase.
pub const MAX_PHASE_SECS: i64 = 24 * 3600;

/// Number of trailing records handed to plotting consumers.
pub const DISPLAY_WINDOW: usize = 60;

// Form defaults
pub const DEFAULT_CONSTANT_LOAD: &str = "80";
pub const DEFAULT_PULSED_HIGH: &str = "90";
pub const DEFAULT_PULSED_LOW: &str = "10";
pub const DEFAULT_PULSED_ON: &str = "5";
pub const DEFAULT_PULSED_OFF: &str = "5";
pub const DEFAULT_RAMP_START: &str = "10";
pub const DEFAULT_RAMP_END: &str = "100";
pub const DEFAULT_DURATION: &str = "60";

// Sysfs roots probed for sensors
pub const POWERCAP_ROOT: &str = "/sys/class/powercap";
pub const HWMON_ROOT: &str = "/sys/class/hwmon";
pub const THERMAL_ROOT: &str = "/sys/class/thermal";

/// Runtime knobs for a [`SessionController`](crate::session::controller::SessionController).
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub control_period: Duration,
    pub profile_tick: Duration,
    pub telemetry_tick: Duration,
    pub join_timeout: Duration,
    /// Pin worker `i` to logical core `i` (best effort).
    pub pin_affinity: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            control_period: CONTROL_PERIOD,
            profile_tick: PROFILE_TICK,
            telemetry_tick: TELEMETRY_TICK,
            join_timeout: WORKER_JOIN_TIMEOUT,
            pin_affinity: true,
        }
    }
}
