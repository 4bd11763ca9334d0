//! Process-wide movement speed multiplier.

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free `f64` cell holding the global speed multiplier.
///
/// Every write is clamped to `[MIN, MAX]`; a NaN write stores `MIN`.  Reads
/// happen once per movement tick, writes come from the control surface.
#[derive(Debug)]
pub struct SpeedMultiplier {
    bits: AtomicU64,
}

impl SpeedMultiplier {
    pub const MIN: f64 = 0.01;
    pub const MAX: f64 = 10.0;

    pub fn new(value: f64) -> Self {
        Self { bits: AtomicU64::new(Self::clamp(value).to_bits()) }
    }

    /// Clamp `value` into the legal range.
    pub fn clamp(value: f64) -> f64 {
        if value.is_nan() {
            Self::MIN
        } else {
            value.clamp(Self::MIN, Self::MAX)
        }
    }

    /// Store `value` (clamped) and return what was stored.
    pub fn set(&self, value: f64) -> f64 {
        let v = Self::clamp(value);
        self.bits.store(v.to_bits(), Ordering::Relaxed);
        v
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for SpeedMultiplier {
    fn default() -> Self {
        Self::new(1.0)
    }
}
