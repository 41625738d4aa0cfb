//! # Monitoring Middleware
//!
//! Axum middleware that times every classified request, counts failing
//! responses per label and logs slow requests. Telemetry never gates a
//! request: when a metric cannot be obtained the request is still forwarded.

use crate::classifier::{Label, RequestClassifier};
use crate::metrics::{LatencyTimer, MetricStore};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Requests taking longer than this are logged as slow.
pub const DEFAULT_SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(100);

/// Metric name of the latency timer for `label`.
pub fn duration_metric(label: Label) -> &'static str {
    match label {
        Label::Edit => "duration.edit",
        Label::DocLoad => "duration.doc-load",
        Label::Others => "duration.others",
    }
}

/// Metric name of the error meter for `label`.
pub fn error_metric(label: Label) -> &'static str {
    match label {
        Label::Edit => "errors.edit",
        Label::DocLoad => "errors.doc-load",
        Label::Others => "errors.others",
    }
}

/// Metric name of the error ratio gauge for `label`.
pub fn error_ratio_metric(label: Label) -> &'static str {
    match label {
        Label::Edit => "error-ratio.edit",
        Label::DocLoad => "error-ratio.doc-load",
        Label::Others => "error-ratio.others",
    }
}

/// Statuses that count as a successful response.
pub fn is_success(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::NO_CONTENT
}

/// # Monitoring Middleware
///
/// Shared state of the middleware. Install it with
/// `axum::middleware::from_fn_with_state(middleware, monitor_requests)`.
#[derive(Debug, Clone)]
pub struct MonitoringMiddleware {
    store: Arc<MetricStore>,
    classifier: Arc<RequestClassifier>,
    slow_threshold: Duration,
}

impl MonitoringMiddleware {
    pub fn new(store: Arc<MetricStore>, classifier: Arc<RequestClassifier>) -> Self {
        Self {
            store,
            classifier,
            slow_threshold: DEFAULT_SLOW_REQUEST_THRESHOLD,
        }
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    fn timer(&self, label: Label) -> Option<Arc<LatencyTimer>> {
        match self.store.timer(duration_metric(label)) {
            Ok(timer) => Some(timer),
            Err(e) => {
                warn!(label = %label, error = %e, "Request timer unavailable");
                None
            }
        }
    }

    /// Mark one failed request for `label`. The error ratio gauge is
    /// registered by whichever request creates the meter.
    fn record_error(&self, label: Label) {
        let meter_name = error_metric(label);
        let created = match self.store.meter_entry(meter_name) {
            Ok((meter, created)) => {
                meter.mark();
                created
            }
            Err(e) => {
                warn!(label = %label, error = %e, "Error meter unavailable");
                return;
            }
        };
        if created {
            if let Err(e) = self.store.register_ratio(
                error_ratio_metric(label),
                meter_name,
                duration_metric(label),
            ) {
                warn!(label = %label, error = %e, "Error ratio gauge unavailable");
            }
        }
    }

    fn log_if_slow(&self, url: &str, elapsed_nanos: u64) {
        if elapsed_nanos > self.slow_threshold.as_nanos() as u64 {
            let seconds = elapsed_nanos as f64 / 1_000_000_000.0;
            warn!(url = %url, seconds, "Long request: {} - took {} seconds", url, seconds);
        }
    }
}

/// Rebuild the absolute URL of a request, query string included.
pub fn request_url(request: &Request) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("http://{}{}", host, path_and_query)
}

/// Middleware function timing classified requests.
pub async fn monitor_requests(
    State(monitoring): State<MonitoringMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    let url = request_url(&request);
    let label = monitoring
        .classifier
        .classify_request(request.uri().path(), &url);

    let Some(label) = label else {
        return next.run(request).await;
    };
    let Some(timer) = monitoring.timer(label) else {
        return next.run(request).await;
    };

    let context = timer.time();
    let response = next.run(request).await;
    let elapsed = context.stop();

    if !is_success(response.status()) {
        monitoring.record_error(label);
    }
    monitoring.log_if_slow(&url, elapsed);

    response
}
