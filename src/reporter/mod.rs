//! # Metric Reporters
//!
//! Periodic export of the metric registry to exactly one backend. The backend
//! is chosen once at startup by walking an ordered fallback chain:
//!
//! 1. push collector, when a `host:port` is configured
//! 2. cloud monitoring API, when both credentials are present
//! 3. structured log, always available
//!
//! The first builder that produces a reporter wins. A builder that fails is
//! logged and skipped.

pub mod cloud;
pub mod collector;
pub mod log;
pub mod sigv4;

pub use cloud::CloudReporter;
pub use collector::CollectorReporter;
pub use log::LogReporter;
pub use sigv4::Credentials;

use crate::config::Config;
use crate::error::MonitoringError;
use crate::metrics::{MetricStore, RegistrySnapshot};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Product prefix applied to every metric name sent to an external backend.
pub const METRIC_PREFIX: &str = "webauthor";

/// A metric export backend.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Export one snapshot of the registry.
    async fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), MonitoringError>;
}

/// # Reporter Settings
///
/// Backend selection inputs, read once at startup.
#[derive(Debug, Clone)]
pub struct ReporterSettings {
    pub collector_address: Option<String>,
    pub credentials: Option<Credentials>,
    pub region: String,
    pub cloud_endpoint: Option<String>,
    pub https_proxy: Option<String>,
    pub http_timeout: Duration,
    pub interval: Duration,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            collector_address: None,
            credentials: None,
            region: "us-east-1".to_string(),
            cloud_endpoint: None,
            https_proxy: None,
            http_timeout: Duration::from_secs(30),
            interval: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for ReporterSettings {
    fn from(config: &Config) -> Self {
        Self {
            collector_address: config.collector_address.clone().filter(|a| !a.is_empty()),
            credentials: config
                .cloud_credentials()
                .map(|(key, secret)| Credentials::new(key, secret)),
            region: config.aws_region.clone(),
            cloud_endpoint: config.cloud_endpoint.clone().filter(|e| !e.is_empty()),
            https_proxy: config.https_proxy.clone().filter(|p| !p.is_empty()),
            http_timeout: Duration::from_secs(config.http_client_timeout),
            interval: config.report_interval(),
        }
    }
}

/// Tries to build one backend. `Ok(None)` means the backend is not configured.
pub type ReporterBuilder = fn(&ReporterSettings) -> Result<Option<Box<dyn Reporter>>, MonitoringError>;

fn build_collector(settings: &ReporterSettings) -> Result<Option<Box<dyn Reporter>>, MonitoringError> {
    Ok(CollectorReporter::from_settings(settings)?.map(|r| Box::new(r) as Box<dyn Reporter>))
}

fn build_cloud(settings: &ReporterSettings) -> Result<Option<Box<dyn Reporter>>, MonitoringError> {
    Ok(CloudReporter::from_settings(settings)?.map(|r| Box::new(r) as Box<dyn Reporter>))
}

fn build_log(settings: &ReporterSettings) -> Result<Option<Box<dyn Reporter>>, MonitoringError> {
    Ok(LogReporter::from_settings(settings)?.map(|r| Box::new(r) as Box<dyn Reporter>))
}

/// The backends in order of preference.
pub const FALLBACK_CHAIN: [(&str, ReporterBuilder); 3] = [
    ("collector", build_collector),
    ("cloud", build_cloud),
    ("log", build_log),
];

/// # Reporter Scheduler
///
/// Owns the selected reporter and runs it on a fixed interval against the
/// shared registry.
pub struct ReporterScheduler {
    reporter: Box<dyn Reporter>,
    store: Arc<MetricStore>,
    interval: Duration,
}

impl ReporterScheduler {
    /// Pick the first backend of the fallback chain that can be built.
    pub fn select(settings: &ReporterSettings, store: Arc<MetricStore>) -> Self {
        Self::select_from(&FALLBACK_CHAIN, settings, store)
    }

    /// Same as [`select`](Self::select) with an explicit chain. The log
    /// reporter is used when no builder succeeds.
    pub fn select_from(
        chain: &[(&str, ReporterBuilder)],
        settings: &ReporterSettings,
        store: Arc<MetricStore>,
    ) -> Self {
        let reporter = chain
            .iter()
            .find_map(|(name, build)| match build(settings) {
                Ok(Some(reporter)) => Some(reporter),
                Ok(None) => {
                    debug!(backend = name, "Metric backend not configured");
                    None
                }
                Err(e) => {
                    warn!(backend = name, error = %e, "Metric backend unavailable, trying next");
                    None
                }
            })
            .unwrap_or_else(|| Box::new(LogReporter::new()) as Box<dyn Reporter>);

        info!(
            backend = reporter.name(),
            interval_ms = settings.interval.as_millis() as u64,
            "Selected metric reporter"
        );

        Self::new(reporter, store, settings.interval)
    }

    pub fn new(reporter: Box<dyn Reporter>, store: Arc<MetricStore>, interval: Duration) -> Self {
        Self {
            reporter,
            store,
            interval,
        }
    }

    pub fn reporter_name(&self) -> &'static str {
        self.reporter.name()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take a snapshot and export it once.
    pub async fn run_once(&self) -> Result<(), MonitoringError> {
        let snapshot = self.store.snapshot();
        self.reporter.report(&snapshot).await
    }

    /// Run forever on the configured interval. Cycles never overlap: a cycle
    /// that overruns its period causes the missed firings to be skipped. A
    /// failed cycle is logged and the loop continues.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    warn!(backend = self.reporter.name(), error = %e, "Metric report failed");
                }
            }
        })
    }
}

/// One numeric value of one metric, ready for a flat backend.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Datum {
    pub metric: String,
    pub field: &'static str,
    pub value: f64,
}

/// Flatten a snapshot, dropping values a backend cannot represent.
pub(crate) fn datums(snapshot: &RegistrySnapshot) -> Vec<Datum> {
    snapshot
        .metrics
        .iter()
        .flat_map(|(name, value)| {
            value.fields().into_iter().map(move |(field, value)| Datum {
                metric: name.clone(),
                field,
                value,
            })
        })
        .filter(|datum| datum.value.is_finite())
        .collect()
}
