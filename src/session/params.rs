//! Text form input to validated test configuration.
//!
//! Percentages are integers clamped to `0..=100` and converted to ratios.
//! Durations and pulse phases are whole seconds. Nothing here touches
//! session state, so a rejected form leaves a running test alone.

use std::time::Duration;

use crate::config::{
    DEFAULT_CONSTANT_LOAD, DEFAULT_PULSED_HIGH, DEFAULT_PULSED_LOW, DEFAULT_PULSED_OFF,
    DEFAULT_PULSED_ON, DEFAULT_RAMP_END, DEFAULT_RAMP_START, MAX_DURATION_SECS, MAX_PHASE_SECS,
};
use crate::error::ConfigError;
use crate::load::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Constant,
    Pulsed,
    Ramp,
}

/// Raw parameter fields as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileInput {
    Constant {
        load: String,
    },
    Pulsed {
        high: String,
        low: String,
        on_secs: String,
        off_secs: String,
    },
    Ramp {
        start: String,
        end: String,
    },
}

impl ProfileInput {
    /// Form pre-filled with the default values.
    pub fn defaults(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Constant => ProfileInput::Constant {
                load: DEFAULT_CONSTANT_LOAD.into(),
            },
            ProfileKind::Pulsed => ProfileInput::Pulsed {
                high: DEFAULT_PULSED_HIGH.into(),
                low: DEFAULT_PULSED_LOW.into(),
                on_secs: DEFAULT_PULSED_ON.into(),
                off_secs: DEFAULT_PULSED_OFF.into(),
            },
            ProfileKind::Ramp => ProfileInput::Ramp {
                start: DEFAULT_RAMP_START.into(),
                end: DEFAULT_RAMP_END.into(),
            },
        }
    }

    pub fn kind(&self) -> ProfileKind {
        match self {
            ProfileInput::Constant { .. } => ProfileKind::Constant,
            ProfileInput::Pulsed { .. } => ProfileKind::Pulsed,
            ProfileInput::Ramp { .. } => ProfileKind::Ramp,
        }
    }

    pub fn to_profile(&self) -> Result<Profile, ConfigError> {
        match self {
            ProfileInput::Constant { load } => Ok(Profile::Constant {
                load: percent("load", load)?,
            }),
            ProfileInput::Pulsed {
                high,
                low,
                on_secs,
                off_secs,
            } => {
                let high = percent("high load", high)?;
                let low = percent("low load", low)?;
                let on = phase("on time", on_secs)?;
                let off = phase("off time", off_secs)?;
                if on + off == 0 {
                    return Err(ConfigError::ZeroPulseCycle);
                }
                Ok(Profile::Pulsed {
                    high,
                    low,
                    on_time: Duration::from_secs(on),
                    off_time: Duration::from_secs(off),
                })
            }
            ProfileInput::Ramp { start, end } => Ok(Profile::Ramp {
                start: percent("start load", start)?,
                end: percent("end load", end)?,
            }),
        }
    }
}

fn integer(field: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidInteger {
            field,
            value: raw.to_string(),
        })
}

/// Integer percentage clamped to `0..=100`, as a ratio.
fn percent(field: &'static str, raw: &str) -> Result<f64, ConfigError> {
    Ok(integer(field, raw)?.clamp(0, 100) as f64 / 100.0)
}

fn phase(field: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let secs = integer(field, raw)?;
    if !(0..=MAX_PHASE_SECS).contains(&secs) {
        return Err(ConfigError::OutOfRange {
            field,
            value: secs,
            min: 0,
            max: MAX_PHASE_SECS,
        });
    }
    Ok(secs as u64)
}

fn duration(raw: &str) -> Result<Duration, ConfigError> {
    let secs = integer("duration", raw)?;
    if secs <= 0 {
        return Err(ConfigError::NonPositiveDuration(secs));
    }
    if secs > MAX_DURATION_SECS {
        return Err(ConfigError::OutOfRange {
            field: "duration",
            value: secs,
            min: 1,
            max: MAX_DURATION_SECS,
        });
    }
    Ok(Duration::from_secs(secs as u64))
}

/// A validated profile plus the total run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestConfig {
    profile: Profile,
    duration: Duration,
}

impl TestConfig {
    pub fn parse(input: &ProfileInput, duration_secs: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            profile: input.to_profile()?,
            duration: duration(duration_secs)?,
        })
    }

    pub fn constant(load_percent: i64, duration_secs: i64) -> Result<Self, ConfigError> {
        Self::parse(
            &ProfileInput::Constant {
                load: load_percent.to_string(),
            },
            &duration_secs.to_string(),
        )
    }

    pub fn pulsed(
        high_percent: i64,
        low_percent: i64,
        on_secs: i64,
        off_secs: i64,
        duration_secs: i64,
    ) -> Result<Self, ConfigError> {
        Self::parse(
            &ProfileInput::Pulsed {
                high: high_percent.to_string(),
                low: low_percent.to_string(),
                on_secs: on_secs.to_string(),
                off_secs: off_secs.to_string(),
            },
            &duration_secs.to_string(),
        )
    }

    pub fn ramp(
        start_percent: i64,
        end_percent: i64,
        duration_secs: i64,
    ) -> Result<Self, ConfigError> {
        Self::parse(
            &ProfileInput::Ramp {
                start: start_percent.to_string(),
                end: end_percent.to_string(),
            },
            &duration_secs.to_string(),
        )
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
