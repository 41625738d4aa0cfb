//! # Rate Meter
//!
//! Counts events and tracks their mean rate plus 1/5/15-minute moving rates.

use super::clock::Clock;
use super::ewma::{Ewma, TICK_INTERVAL_NANOS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// # Rate Meter
///
/// Lock-free event meter. Moving averages are ticked lazily: whichever caller
/// first observes that a tick interval has elapsed wins a compare-and-swap on
/// the last tick and performs all the missed ticks.
#[derive(Debug)]
pub struct RateMeter {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    count: AtomicU64,
    start_time: u64,
    last_tick: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl RateMeter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let start_time = clock.tick();
        Self {
            m1: Ewma::one_minute(),
            m5: Ewma::five_minutes(),
            m15: Ewma::fifteen_minutes(),
            count: AtomicU64::new(0),
            start_time,
            last_tick: AtomicU64::new(start_time),
            clock,
        }
    }

    /// Record one event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Record `n` events.
    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let new_tick = self.clock.tick();
        let age = new_tick.saturating_sub(old_tick);
        if age <= TICK_INTERVAL_NANOS {
            return;
        }

        let new_interval_start = new_tick - age % TICK_INTERVAL_NANOS;
        if self
            .last_tick
            .compare_exchange(old_tick, new_interval_start, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let required_ticks = age / TICK_INTERVAL_NANOS;
            for _ in 0..required_ticks {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean rate since creation, in events per second.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.clock.tick().saturating_sub(self.start_time);
        if elapsed == 0 {
            return 0.0;
        }
        count as f64 / elapsed as f64 * 1_000_000_000.0
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate_per_second()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate_per_second()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate_per_second()
    }
}
