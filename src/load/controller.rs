//! Shared load target read by every worker on every control period.
//!
//! The ratio is a single `f64` stored as its bit pattern in an `AtomicU64`:
//! workers load it lock-free, the session (or profile engine) stores it.
//! A reader sees either the old or the new value, never a torn one.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Clamps a load ratio into `[0.0, 1.0]`. NaN maps to idle.
#[inline]
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return 0.0;
    }
    ratio.clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct LoadController {
    bits: AtomicU64,
}

pub type SharedLoad = Arc<LoadController>;

impl LoadController {
    pub fn new(initial: f64) -> Self {
        Self {
            bits: AtomicU64::new(initial.to_bits()),
        }
    }

    pub fn shared(initial: f64) -> SharedLoad {
        Arc::new(Self::new(initial))
    }

    /// Raw value as last written; may be out of range.
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Value clamped for use as a duty ratio.
    #[inline]
    pub fn ratio(&self) -> f64 {
        clamp_ratio(self.get())
    }

    #[inline]
    pub fn set(&self, ratio: f64) {
        self.bits.store(ratio.to_bits(), Ordering::Relaxed);
    }
}
