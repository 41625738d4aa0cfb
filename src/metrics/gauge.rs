//! # Gauges
//!
//! Metrics whose value is computed when read rather than stored.

use super::store::MetricStore;
use std::fmt;
use std::sync::Arc;

/// A quotient that degrades to NaN instead of failing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    numerator: f64,
    denominator: f64,
}

impl Ratio {
    pub fn of(numerator: f64, denominator: f64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn value(&self) -> f64 {
        if self.denominator == 0.0 || !self.denominator.is_finite() || self.numerator.is_nan() {
            return f64::NAN;
        }
        self.numerator / self.denominator
    }
}

/// # Ratio Gauge
///
/// `numerator.rate / denominator.rate` over the fifteen-minute moving rates
/// of two other registered metrics, looked up by name on every read. The two
/// rates are read independently, so the quotient is an approximation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioGauge {
    numerator: String,
    denominator: String,
}

impl RatioGauge {
    pub fn new(numerator: impl Into<String>, denominator: impl Into<String>) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }

    pub fn numerator(&self) -> &str {
        &self.numerator
    }

    pub fn denominator(&self) -> &str {
        &self.denominator
    }

    /// Evaluate against the registry. Missing metrics yield NaN.
    pub fn value(&self, store: &MetricStore) -> f64 {
        let numerator = store.fifteen_minute_rate(&self.numerator).unwrap_or(f64::NAN);
        let denominator = store.fifteen_minute_rate(&self.denominator).unwrap_or(f64::NAN);
        Ratio::of(numerator, denominator).value()
    }
}

/// Closure-backed gauge.
#[derive(Clone)]
pub struct Gauge {
    read: Arc<dyn Fn() -> f64 + Send + Sync>,
}

impl Gauge {
    pub fn new(read: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            read: Arc::new(read),
        }
    }

    pub fn value(&self) -> f64 {
        (self.read)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_denominator_is_nan() {
        assert!(Ratio::of(1.0, 0.0).value().is_nan());
        assert!(Ratio::of(0.0, 0.0).value().is_nan());
        assert!(Ratio::of(1.0, f64::NAN).value().is_nan());
        assert!(Ratio::of(1.0, f64::INFINITY).value().is_nan());
    }

    #[test]
    fn test_ratio_value() {
        assert_eq!(Ratio::of(1.0, 4.0).value(), 0.25);
    }

    #[test]
    fn test_gauge_reads_closure() {
        let gauge = Gauge::new(|| 42.0);
        assert_eq!(gauge.value(), 42.0);
    }
}
