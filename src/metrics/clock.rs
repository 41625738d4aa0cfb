//! # Clocks
//!
//! Time sources for meters, timers and reservoirs. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] to get deterministic rates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic ticks and wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Monotonic time in nanoseconds, relative to an arbitrary origin.
    fn tick(&self) -> u64;

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn time_millis(&self) -> u64;
}

/// Clock backed by [`Instant`] and [`SystemTime`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn time_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// # Manual Clock
///
/// A clock that only moves when told to. Wall-clock time is derived from the
/// tick so that both views stay consistent.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute tick in nanoseconds.
    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Set the absolute tick in whole seconds.
    pub fn set_secs(&self, secs: u64) {
        self.set_nanos(secs * 1_000_000_000);
    }

    /// Move the clock forward.
    pub fn advance_nanos(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn time_millis(&self) -> u64 {
        self.tick() / 1_000_000
    }
}
