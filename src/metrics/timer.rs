//! # Latency Timer
//!
//! A rate meter of completions combined with a decaying reservoir of observed
//! durations.

use super::clock::Clock;
use super::meter::RateMeter;
use super::reservoir::{ExponentiallyDecayingReservoir, WeightedSnapshot};
use std::sync::Arc;
use std::time::Duration;

/// # Latency Timer
#[derive(Debug)]
pub struct LatencyTimer {
    meter: RateMeter,
    reservoir: ExponentiallyDecayingReservoir,
    clock: Arc<dyn Clock>,
}

impl LatencyTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: RateMeter::new(clock.clone()),
            reservoir: ExponentiallyDecayingReservoir::new(clock.clone()),
            clock,
        }
    }

    /// Record one completed event that took `duration`.
    pub fn update(&self, duration: Duration) {
        self.update_nanos(duration.as_nanos().min(i64::MAX as u128) as i64);
    }

    fn update_nanos(&self, nanos: i64) {
        if nanos >= 0 {
            self.reservoir.update(nanos);
            self.meter.mark();
        }
    }

    /// Start timing an event. The returned context records exactly once,
    /// either on [`TimerContext::stop`] or when dropped.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start: self.clock.tick(),
            stopped: false,
        }
    }

    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    pub fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    /// Durations currently sampled, in nanoseconds.
    pub fn snapshot(&self) -> WeightedSnapshot {
        self.reservoir.snapshot()
    }
}

/// In-flight measurement returned by [`LatencyTimer::time`].
#[derive(Debug)]
pub struct TimerContext<'a> {
    timer: &'a LatencyTimer,
    start: u64,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record the elapsed time and return it in nanoseconds.
    pub fn stop(mut self) -> u64 {
        self.record()
    }

    fn record(&mut self) -> u64 {
        let elapsed = self.timer.clock.tick().saturating_sub(self.start);
        if !self.stopped {
            self.stopped = true;
            self.timer.update_nanos(elapsed.min(i64::MAX as u64) as i64);
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::clock::ManualClock;

    #[test]
    fn test_update_records_count_and_sample() {
        let timer = LatencyTimer::new(Arc::new(ManualClock::new()));
        timer.update(Duration::from_millis(5));
        timer.update(Duration::from_millis(15));
        assert_eq!(timer.count(), 2);
        let snapshot = timer.snapshot();
        assert_eq!(snapshot.min(), 5_000_000);
        assert_eq!(snapshot.max(), 15_000_000);
    }

    #[test]
    fn test_context_stop_measures_with_clock() {
        let clock = Arc::new(ManualClock::new());
        let timer = LatencyTimer::new(clock.clone());
        let context = timer.time();
        clock.advance_nanos(250_000_000);
        assert_eq!(context.stop(), 250_000_000);
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().max(), 250_000_000);
    }

    #[test]
    fn test_dropped_context_records_once() {
        let clock = Arc::new(ManualClock::new());
        let timer = LatencyTimer::new(clock.clone());
        {
            let _context = timer.time();
            clock.advance_nanos(1_000);
        }
        assert_eq!(timer.count(), 1);
    }
}
