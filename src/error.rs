#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

/// # Monitoring Error
///
/// Errors surfaced by the metric registry, the reporters and the log manager.
/// Telemetry paths (middleware, reporter cycles) log and swallow these;
/// administrative paths (log streaming, verbosity changes) return them to the
/// caller.
#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No active log file is configured")]
    LogFileNotConfigured,

    #[error("No verbosity override recorded for '{0}'")]
    NoOverride(String),

    #[error("Metric '{name}' is already registered with a type other than {expected}")]
    MetricTypeMismatch { name: String, expected: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Reporter error: {0}")]
    Reporter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl MonitoringError {
    /// Short machine-readable category used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitoringError::Io(_) => "io_error",
            MonitoringError::LogFileNotConfigured => "log_file_not_configured",
            MonitoringError::NoOverride(_) => "no_override",
            MonitoringError::MetricTypeMismatch { .. } => "metric_type_mismatch",
            MonitoringError::Serialization(_) => "serialization_error",
            MonitoringError::Reporter(_) => "reporter_error",
            MonitoringError::Config(_) => "config_error",
            MonitoringError::Http(_) => "http_error",
            MonitoringError::BadRequest(_) => "bad_request",
        }
    }
}

#[cfg(feature = "server")]
impl IntoResponse for MonitoringError {
    fn into_response(self) -> Response {
        let status = match &self {
            MonitoringError::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                std::io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            MonitoringError::LogFileNotConfigured => StatusCode::NOT_FOUND,
            MonitoringError::NoOverride(_) => StatusCode::CONFLICT,
            MonitoringError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        }));

        (status, body).into_response()
    }
}
