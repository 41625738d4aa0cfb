//! # Structured Log Reporter
//!
//! Terminal fallback of the reporter chain. Each cycle writes one JSON object
//! to the dedicated metrics log channel.

use super::{Reporter, ReporterSettings};
use crate::error::MonitoringError;
use crate::metrics::RegistrySnapshot;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

/// Tracing target of the metrics channel. The logging setup routes it to its
/// own output, separate from application logs.
pub const METRICS_TARGET: &str = "webauthor::metrics";

/// Name usable as a CloudWatch-style key: dots become dashes.
pub fn safe_name(name: &str) -> String {
    name.replace('.', "-")
}

/// # Log Reporter
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn from_settings(_settings: &ReporterSettings) -> Result<Option<Self>, MonitoringError> {
        Ok(Some(Self))
    }

    /// One JSON object holding every metric plus a `timestamp` in epoch
    /// milliseconds.
    pub fn render(&self, snapshot: &RegistrySnapshot) -> Result<String, MonitoringError> {
        let mut object = Map::new();
        for (name, value) in &snapshot.metrics {
            object.insert(safe_name(name), serde_json::to_value(value)?);
        }
        object.insert("timestamp".to_string(), Value::from(snapshot.timestamp));
        Ok(serde_json::to_string(&Value::Object(object))?)
    }
}

#[async_trait]
impl Reporter for LogReporter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), MonitoringError> {
        let json = self.render(snapshot)?;
        info!(target: METRICS_TARGET, "{}", json);
        Ok(())
    }
}
