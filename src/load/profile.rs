//! Load profiles and the engine that recomputes the shared target on each tick.
//!
//! - **Constant:** fixed ratio; the engine never writes after the initial value.
//! - **Pulsed:** `high` for `on_time`, then `low` for `off_time`, repeating.
//! - **Ramp:** linear from `start` to `end` over the session duration, then holds `end`.

use std::time::Duration;

use crate::load::controller::SharedLoad;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Profile {
    Constant {
        load: f64,
    },
    Pulsed {
        high: f64,
        low: f64,
        on_time: Duration,
        off_time: Duration,
    },
    Ramp {
        start: f64,
        end: f64,
    },
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Constant { .. } => "Constant",
            Profile::Pulsed { .. } => "Pulsed",
            Profile::Ramp { .. } => "Ramp",
        }
    }

    /// True when the target changes over time and needs periodic ticks.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Profile::Constant { .. })
    }

    /// Ratio written to the load controller at session start.
    pub fn initial_ratio(&self) -> f64 {
        match *self {
            Profile::Constant { load } => load,
            Profile::Pulsed { high, .. } => high,
            Profile::Ramp { start, .. } => start,
        }
    }

    /// Target ratio after `elapsed` of a session lasting `total`.
    pub fn target_at(&self, elapsed: Duration, total: Duration) -> f64 {
        match *self {
            Profile::Constant { load } => load,
            Profile::Pulsed {
                high,
                low,
                on_time,
                off_time,
            } => {
                let cycle = (on_time + off_time).as_nanos();
                if cycle == 0 {
                    return high;
                }
                let phase = elapsed.as_nanos() % cycle;
                if phase < on_time.as_nanos() { high } else { low }
            }
            Profile::Ramp { start, end } => {
                let progress = if total.is_zero() {
                    1.0
                } else {
                    (elapsed.as_secs_f64() / total.as_secs_f64()).min(1.0)
                };
                start + (end - start) * progress
            }
        }
    }
}

/// Writes the profile's target into the shared load controller when ticked.
#[derive(Debug, Clone)]
pub struct ProfileEngine {
    profile: Profile,
    total: Duration,
    load: SharedLoad,
}

impl ProfileEngine {
    pub fn new(profile: Profile, total: Duration, load: SharedLoad) -> Self {
        Self {
            profile,
            total,
            load,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Recomputes and publishes the target. Constant profiles leave the
    /// controller untouched.
    pub fn tick(&self, elapsed: Duration) -> f64 {
        if !self.profile.is_dynamic() {
            return self.load.get();
        }
        let target = self.profile.target_at(elapsed, self.total);
        self.load.set(target);
        target
    }
}
