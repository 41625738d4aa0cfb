//! # Metric Store
//!
//! The process-wide registry of named metrics. It is constructed once at
//! startup and shared (behind an `Arc`) by the middleware, the reporter and
//! the monitoring endpoints.

use super::clock::{Clock, SystemClock};
use super::gauge::{Gauge, RatioGauge};
use super::meter::RateMeter;
use super::timer::LatencyTimer;
use crate::error::MonitoringError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A registered metric.
#[derive(Debug, Clone)]
pub enum Metric {
    Meter(Arc<RateMeter>),
    Timer(Arc<LatencyTimer>),
    Ratio(Arc<RatioGauge>),
    Gauge(Gauge),
}

impl Metric {
    pub fn type_name(&self) -> &'static str {
        match self {
            Metric::Meter(_) => "meter",
            Metric::Timer(_) => "timer",
            Metric::Ratio(_) => "ratio gauge",
            Metric::Gauge(_) => "gauge",
        }
    }
}

/// # Metric Store
///
/// Get-or-create is register-once: the first creator of a name wins and every
/// later or concurrent caller receives that same instance. Creation happens
/// while holding the map entry, so two threads can never both install a
/// metric under one name.
#[derive(Debug)]
pub struct MetricStore {
    metrics: DashMap<String, Metric>,
    clock: Arc<dyn Clock>,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a store whose metrics all read time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            metrics: DashMap::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn get_or_create<T>(
        &self,
        name: &str,
        expected: &'static str,
        extract: impl Fn(&Metric) -> Option<T>,
        create: impl FnOnce() -> Metric,
    ) -> Result<(T, bool), MonitoringError> {
        let mismatch = || MonitoringError::MetricTypeMismatch {
            name: name.to_string(),
            expected,
        };

        // Fast path: most lookups hit an existing metric.
        if let Some(existing) = self.metrics.get(name) {
            return extract(existing.value()).map(|h| (h, false)).ok_or_else(mismatch);
        }

        match self.metrics.entry(name.to_string()) {
            Entry::Occupied(entry) => extract(entry.get()).map(|h| (h, false)).ok_or_else(mismatch),
            Entry::Vacant(entry) => {
                let metric = create();
                let handle = extract(&metric).ok_or_else(mismatch)?;
                entry.insert(metric);
                debug!(metric = name, kind = expected, "registered metric");
                Ok((handle, true))
            }
        }
    }

    /// Fetch or create the latency timer registered under `name`.
    pub fn timer(&self, name: &str) -> Result<Arc<LatencyTimer>, MonitoringError> {
        self.get_or_create(
            name,
            "timer",
            |metric| match metric {
                Metric::Timer(timer) => Some(timer.clone()),
                _ => None,
            },
            || Metric::Timer(Arc::new(LatencyTimer::new(self.clock.clone()))),
        )
        .map(|(timer, _)| timer)
    }

    /// Fetch or create the rate meter registered under `name`.
    pub fn meter(&self, name: &str) -> Result<Arc<RateMeter>, MonitoringError> {
        self.meter_entry(name).map(|(meter, _)| meter)
    }

    /// Like [`meter`](Self::meter), also reporting whether this call created
    /// the meter. Exactly one caller observes `true` for a given name.
    pub fn meter_entry(&self, name: &str) -> Result<(Arc<RateMeter>, bool), MonitoringError> {
        self.get_or_create(
            name,
            "meter",
            |metric| match metric {
                Metric::Meter(meter) => Some(meter.clone()),
                _ => None,
            },
            || Metric::Meter(Arc::new(RateMeter::new(self.clock.clone()))),
        )
    }

    /// Register a ratio gauge computed on every read as
    /// `numerator / denominator`. Registering the same name again with the
    /// same operands is a no-op.
    pub fn register_ratio(
        &self,
        name: &str,
        numerator: &str,
        denominator: &str,
    ) -> Result<Arc<RatioGauge>, MonitoringError> {
        let candidate = RatioGauge::new(numerator, denominator);
        self.get_or_create(
            name,
            "ratio gauge",
            |metric| match metric {
                Metric::Ratio(ratio) if **ratio == candidate => Some(ratio.clone()),
                _ => None,
            },
            || Metric::Ratio(Arc::new(candidate.clone())),
        )
        .map(|(ratio, _)| ratio)
    }

    /// Register a closure-backed gauge. An existing gauge under `name` is kept.
    pub fn register_gauge(&self, name: &str, gauge: Gauge) -> Result<(), MonitoringError> {
        self.get_or_create(
            name,
            "gauge",
            |metric| match metric {
                Metric::Gauge(_) => Some(()),
                _ => None,
            },
            || Metric::Gauge(gauge),
        )
        .map(|_| ())
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Fifteen-minute rate of a meter or timer, if one is registered under
    /// `name`.
    pub fn fifteen_minute_rate(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Metric::Meter(meter) => Some(meter.fifteen_minute_rate()),
            Metric::Timer(timer) => Some(timer.fifteen_minute_rate()),
            Metric::Ratio(_) | Metric::Gauge(_) => None,
        }
    }

    /// Read every metric. Gauges are evaluated here; nothing is cached.
    pub fn snapshot(&self) -> RegistrySnapshot {
        // Clone the handles first so no map shard is locked while gauges read
        // other metrics.
        let entries: Vec<(String, Metric)> = self
            .metrics
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let metrics = entries
            .into_iter()
            .map(|(name, metric)| {
                let value = match metric {
                    Metric::Meter(meter) => MetricValue::Meter(MeterValue::from_meter(&meter)),
                    Metric::Timer(timer) => MetricValue::Timer(TimerValue::from_timer(&timer)),
                    Metric::Ratio(ratio) => MetricValue::Gauge {
                        value: ratio.value(self),
                    },
                    Metric::Gauge(gauge) => MetricValue::Gauge {
                        value: gauge.value(),
                    },
                };
                (name, value)
            })
            .collect();

        RegistrySnapshot {
            timestamp: self.clock.time_millis(),
            metrics,
        }
    }
}

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Meter reading. Rates are per second.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeterValue {
    pub count: u64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
    pub mean_rate: f64,
    pub units: &'static str,
}

impl MeterValue {
    fn from_meter(meter: &RateMeter) -> Self {
        Self {
            count: meter.count(),
            m1_rate: meter.one_minute_rate(),
            m5_rate: meter.five_minute_rate(),
            m15_rate: meter.fifteen_minute_rate(),
            mean_rate: meter.mean_rate(),
            units: "events/second",
        }
    }
}

/// Timer reading. Durations are in milliseconds, rates per second.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerValue {
    pub count: u64,
    pub max: f64,
    pub mean: f64,
    pub min: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
    pub stddev: f64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
    pub mean_rate: f64,
    pub duration_units: &'static str,
    pub rate_units: &'static str,
}

impl TimerValue {
    fn from_timer(timer: &LatencyTimer) -> Self {
        let snapshot = timer.snapshot();
        Self {
            count: timer.count(),
            max: snapshot.max() as f64 / NANOS_PER_MILLI,
            mean: snapshot.mean() / NANOS_PER_MILLI,
            min: snapshot.min() as f64 / NANOS_PER_MILLI,
            p50: snapshot.median() / NANOS_PER_MILLI,
            p75: snapshot.p75() / NANOS_PER_MILLI,
            p95: snapshot.p95() / NANOS_PER_MILLI,
            p98: snapshot.p98() / NANOS_PER_MILLI,
            p99: snapshot.p99() / NANOS_PER_MILLI,
            p999: snapshot.p999() / NANOS_PER_MILLI,
            stddev: snapshot.std_dev() / NANOS_PER_MILLI,
            m1_rate: timer.one_minute_rate(),
            m5_rate: timer.five_minute_rate(),
            m15_rate: timer.fifteen_minute_rate(),
            mean_rate: timer.mean_rate(),
            duration_units: "milliseconds",
            rate_units: "calls/second",
        }
    }
}

/// Value of one metric at snapshot time.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    /// NaN values serialize as `null`.
    Gauge { value: f64 },
    Meter(MeterValue),
    Timer(TimerValue),
}

impl MetricValue {
    /// Numeric fields as `(suffix, value)` pairs for flat backends.
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        match self {
            MetricValue::Gauge { value } => vec![("value", *value)],
            MetricValue::Meter(m) => vec![
                ("count", m.count as f64),
                ("m1_rate", m.m1_rate),
                ("m5_rate", m.m5_rate),
                ("m15_rate", m.m15_rate),
                ("mean_rate", m.mean_rate),
            ],
            MetricValue::Timer(t) => vec![
                ("count", t.count as f64),
                ("max", t.max),
                ("mean", t.mean),
                ("min", t.min),
                ("stddev", t.stddev),
                ("p50", t.p50),
                ("p75", t.p75),
                ("p95", t.p95),
                ("p98", t.p98),
                ("p99", t.p99),
                ("p999", t.p999),
                ("m1_rate", t.m1_rate),
                ("m5_rate", t.m5_rate),
                ("m15_rate", t.m15_rate),
                ("mean_rate", t.mean_rate),
            ],
        }
    }
}

/// All metric values at one moment, keyed by metric name.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegistrySnapshot {
    /// Epoch milliseconds when the snapshot was taken.
    pub timestamp: u64,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
