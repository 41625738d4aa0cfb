//! # Time-Decayed Reservoir
//!
//! Forward-decaying priority sampling (Cormode et al.) over a fixed number of
//! slots. Every sample gets a weight `exp(alpha * (t - epoch))`, so recent
//! samples dominate the statistics without unbounded memory growth. Once an
//! hour the epoch moves forward and all stored weights and priorities are
//! rescaled, which keeps them away from overflow.

use super::clock::Clock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Number of samples kept by default.
pub const DEFAULT_SIZE: usize = 1028;

/// Default decay factor: strongly biased to the last five minutes.
pub const DEFAULT_ALPHA: f64 = 0.015;

const RESCALE_THRESHOLD_NANOS: u64 = 60 * 60 * 1_000_000_000;

/// Sampling priority; totally ordered so it can key a `BTreeMap`.
#[derive(Debug, Clone, Copy)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedSample {
    value: i64,
    weight: f64,
}

#[derive(Debug)]
struct State {
    values: BTreeMap<Priority, WeightedSample>,
    count: u64,
    /// Epoch of the current weights, in seconds of wall-clock time.
    start_time: u64,
    next_scale_time: u64,
}

/// # Exponentially Decaying Reservoir
#[derive(Debug)]
pub struct ExponentiallyDecayingReservoir {
    size: usize,
    alpha: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl ExponentiallyDecayingReservoir {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_params(DEFAULT_SIZE, DEFAULT_ALPHA, clock)
    }

    pub fn with_params(size: usize, alpha: f64, clock: Arc<dyn Clock>) -> Self {
        let state = State {
            values: BTreeMap::new(),
            count: 0,
            start_time: clock.time_millis() / 1000,
            next_scale_time: clock.tick() + RESCALE_THRESHOLD_NANOS,
        };
        Self {
            size,
            alpha,
            clock,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        let state = self.lock();
        (state.count as usize).min(self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a value observed now.
    pub fn update(&self, value: i64) {
        let timestamp = self.clock.time_millis() / 1000;
        self.update_at(value, timestamp);
    }

    /// Add a value observed at `timestamp` (seconds of wall-clock time).
    pub fn update_at(&self, value: i64, timestamp: u64) {
        let mut state = self.lock();
        self.rescale_if_needed(&mut state);

        let item_weight = self.weight(timestamp as i64 - state.start_time as i64);
        let sample = WeightedSample {
            value,
            weight: item_weight,
        };
        // fastrand::f64() is in [0, 1); flip it so the divisor is never zero.
        let priority = Priority(item_weight / (1.0 - fastrand::f64()));

        state.count += 1;
        if state.count as usize <= self.size || state.values.is_empty() {
            state.values.insert(priority, sample);
        } else if let Some((&lowest, _)) = state.values.first_key_value() {
            if lowest < priority && !state.values.contains_key(&priority) {
                state.values.insert(priority, sample);
                state.values.remove(&lowest);
            }
        }
    }

    fn weight(&self, elapsed_secs: i64) -> f64 {
        (self.alpha * elapsed_secs as f64).exp()
    }

    fn rescale_if_needed(&self, state: &mut State) {
        let now = self.clock.tick();
        if now >= state.next_scale_time {
            self.rescale(state, now);
        }
    }

    /// Move the epoch to the present. Weights are only comparable within one
    /// epoch, so every stored weight and priority is rewritten relative to
    /// the new start time.
    fn rescale(&self, state: &mut State, now: u64) {
        state.next_scale_time = now + RESCALE_THRESHOLD_NANOS;
        let old_start_time = state.start_time;
        state.start_time = self.clock.time_millis() / 1000;
        let elapsed = state.start_time as i64 - old_start_time as i64;
        let scaling_factor = (-self.alpha * elapsed as f64).exp();

        if scaling_factor == 0.0 {
            state.values.clear();
        } else {
            let old_values = std::mem::take(&mut state.values);
            for (priority, sample) in old_values {
                let weight = sample.weight * scaling_factor;
                if weight == 0.0 {
                    continue;
                }
                state.values.insert(
                    Priority(priority.0 * scaling_factor),
                    WeightedSample {
                        value: sample.value,
                        weight,
                    },
                );
            }
        }
        state.count = state.values.len() as u64;
    }

    /// Point-in-time copy of the retained samples.
    pub fn snapshot(&self) -> WeightedSnapshot {
        let state = self.lock();
        WeightedSnapshot::new(state.values.values().copied().map(|s| (s.value, s.weight)))
    }
}

/// # Weighted Snapshot
///
/// Samples sorted by value with weights normalised to sum to one.
#[derive(Debug, Clone, Default)]
pub struct WeightedSnapshot {
    values: Vec<i64>,
    norm_weights: Vec<f64>,
    quantiles: Vec<f64>,
}

impl WeightedSnapshot {
    fn new(samples: impl Iterator<Item = (i64, f64)>) -> Self {
        let mut samples: Vec<(i64, f64)> = samples.collect();
        samples.sort_by_key(|(value, _)| *value);

        let sum_weight: f64 = samples.iter().map(|(_, w)| w).sum();
        let mut values = Vec::with_capacity(samples.len());
        let mut norm_weights = Vec::with_capacity(samples.len());
        for (value, weight) in &samples {
            values.push(*value);
            norm_weights.push(if sum_weight == 0.0 { 0.0 } else { weight / sum_weight });
        }

        let mut quantiles = Vec::with_capacity(samples.len());
        let mut cumulative = 0.0;
        for weight in &norm_weights {
            quantiles.push(cumulative);
            cumulative += weight;
        }

        Self {
            values,
            norm_weights,
            quantiles,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Value at the given quantile (`0.0..=1.0`).
    pub fn value(&self, quantile: f64) -> f64 {
        if !(0.0..=1.0).contains(&quantile) || quantile.is_nan() {
            return f64::NAN;
        }
        if self.values.is_empty() {
            return 0.0;
        }

        let insertion = self.quantiles.partition_point(|q| *q < quantile);
        let found = insertion < self.quantiles.len() && self.quantiles[insertion] == quantile;
        let pos = if found {
            insertion
        } else if insertion == 0 {
            0
        } else {
            insertion - 1
        };

        if pos < 1 {
            return self.values[0] as f64;
        }
        if pos >= self.values.len() {
            return self.values[self.values.len() - 1] as f64;
        }
        self.values[pos] as f64
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    /// Weighted arithmetic mean.
    pub fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.norm_weights)
            .map(|(value, weight)| *value as f64 * weight)
            .sum()
    }

    /// Weighted standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.values.len() <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let variance: f64 = self
            .values
            .iter()
            .zip(&self.norm_weights)
            .map(|(value, weight)| {
                let diff = *value as f64 - mean;
                weight * diff * diff
            })
            .sum();
        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::clock::ManualClock;

    #[test]
    fn test_keeps_at_most_size_samples() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::with_params(100, 0.99, clock);
        for i in 0..1000 {
            reservoir.update(i);
        }
        assert_eq!(reservoir.len(), 100);
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert!(snapshot.values().iter().all(|v| (0..1000).contains(v)));
    }

    #[test]
    fn test_small_population_is_kept_whole() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::with_params(100, 0.99, clock);
        for i in 0..10 {
            reservoir.update(i);
        }
        assert_eq!(reservoir.snapshot().len(), 10);
    }

    #[test]
    fn test_recent_samples_dominate() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::with_params(10, 0.015, clock.clone());

        for _ in 0..1000 {
            reservoir.update(1000);
        }
        // Twenty minutes later (still within one epoch), new values outweigh old.
        clock.set_secs(20 * 60);
        for _ in 0..1000 {
            reservoir.update(2000);
        }
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert!(snapshot.values().iter().all(|v| *v == 2000));
    }

    #[test]
    fn test_rescale_preserves_samples_and_relative_weights() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::with_params(10, 0.015, clock.clone());

        reservoir.update(10);
        clock.set_secs(60);
        reservoir.update(20);
        let before = reservoir.snapshot();

        // Crossing the hourly threshold rescales on the next update.
        clock.set_secs(60 * 60 + 1);
        reservoir.update(30);
        let after = reservoir.snapshot();

        assert_eq!(after.len(), 3);
        assert_eq!(after.values(), &[10, 20, 30]);
        // The newest sample carries the most weight after rescaling.
        assert!(after.norm_weights[2] > after.norm_weights[1]);
        assert!(after.norm_weights[1] > after.norm_weights[0]);
        // Relative weight of the two older samples is unchanged.
        let ratio_before = before.norm_weights[1] / before.norm_weights[0];
        let ratio_after = after.norm_weights[1] / after.norm_weights[0];
        assert!((ratio_before - ratio_after).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_snapshot_statistics() {
        let snapshot = WeightedSnapshot::new(vec![(5, 1.0), (1, 2.0), (3, 1.0)].into_iter());
        assert_eq!(snapshot.values(), &[1, 3, 5]);
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 5);
        assert!((snapshot.mean() - 2.5).abs() < 1e-9);
        assert_eq!(snapshot.value(0.0), 1.0);
        assert_eq!(snapshot.value(0.5), 3.0);
        assert_eq!(snapshot.value(1.0), 5.0);
        assert!(snapshot.value(1.5).is_nan());
        assert!(snapshot.std_dev() > 0.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = WeightedSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.median(), 0.0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.std_dev(), 0.0);
    }
}
