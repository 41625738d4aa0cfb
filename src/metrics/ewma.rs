//! # Exponentially Weighted Moving Average
//!
//! A rate estimator that is ticked every [`TICK_INTERVAL_NANOS`]. Between
//! ticks events are only counted; each tick folds the counted events into the
//! average with a weight derived from the averaging window.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Interval between ticks, in nanoseconds (5 seconds).
pub const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;

const TICK_INTERVAL_SECS: f64 = 5.0;
const SECONDS_PER_MINUTE: f64 = 60.0;

fn alpha_for_minutes(minutes: f64) -> f64 {
    1.0 - (-TICK_INTERVAL_SECS / SECONDS_PER_MINUTE / minutes).exp()
}

/// Moving average of an event rate.
#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    /// Rate in events per nanosecond, stored as `f64` bits.
    rate: AtomicU64,
    uncounted: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            rate: AtomicU64::new(0f64.to_bits()),
            uncounted: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Average over a one-minute window.
    pub fn one_minute() -> Self {
        Self::new(alpha_for_minutes(1.0))
    }

    /// Average over a five-minute window.
    pub fn five_minutes() -> Self {
        Self::new(alpha_for_minutes(5.0))
    }

    /// Average over a fifteen-minute window.
    pub fn fifteen_minutes() -> Self {
        Self::new(alpha_for_minutes(15.0))
    }

    /// Count `n` new events.
    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the events counted since the previous tick into the average.
    ///
    /// Callers serialize ticks; concurrent `update` calls are safe.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::AcqRel);
        let instant_rate = count as f64 / TICK_INTERVAL_NANOS as f64;

        if self.initialized.swap(true, Ordering::AcqRel) {
            let current = f64::from_bits(self.rate.load(Ordering::Acquire));
            let next = current + self.alpha * (instant_rate - current);
            self.rate.store(next.to_bits(), Ordering::Release);
        } else {
            self.rate.store(instant_rate.to_bits(), Ordering::Release);
        }
    }

    /// Current rate in events per second.
    pub fn rate_per_second(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire)) * 1_000_000_000.0
    }
}
