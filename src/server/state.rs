//! # Monitoring Context
//!
//! Shared state passed to the monitoring handlers and the request middleware.

use crate::{
    classifier::RequestClassifier,
    config::Config,
    logs::{LevelControl, LogManager},
    metrics::MetricStore,
    middleware::{MonitoringMiddleware, DEFAULT_SLOW_REQUEST_THRESHOLD},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// # Monitoring Context
///
/// Built once at startup and cloned into every handler.
#[derive(Debug, Clone)]
pub struct MonitoringContext {
    /// Registry shared with the reporter
    pub store: Arc<MetricStore>,
    pub classifier: Arc<RequestClassifier>,
    pub log_manager: Arc<LogManager>,
    /// Requests slower than this are logged
    pub slow_threshold: Duration,
}

impl MonitoringContext {
    pub fn new(
        store: Arc<MetricStore>,
        classifier: RequestClassifier,
        log_manager: LogManager,
    ) -> Self {
        Self {
            store,
            classifier: Arc::new(classifier),
            log_manager: Arc::new(log_manager),
            slow_threshold: DEFAULT_SLOW_REQUEST_THRESHOLD,
        }
    }

    /// Create the context from configuration. `levels` owns the live log
    /// levels, normally the handle returned by [`crate::logging::init`].
    pub fn from_config(config: &Config, levels: Arc<dyn LevelControl>) -> Self {
        let classifier = RequestClassifier::new(
            config.context_path.clone(),
            config.api_root.clone(),
            config.edit_route.clone(),
            config.doc_load_route.clone(),
        );
        let log_manager = LogManager::new(config.log_file.as_ref().map(PathBuf::from), levels);

        Self::new(Arc::new(MetricStore::new()), classifier, log_manager)
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Middleware state sharing this context's registry and classifier.
    pub fn middleware(&self) -> MonitoringMiddleware {
        MonitoringMiddleware::new(self.store.clone(), self.classifier.clone())
            .with_slow_threshold(self.slow_threshold)
    }
}
