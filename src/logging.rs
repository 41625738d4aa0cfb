//! # Logging Setup
//!
//! Installs the global tracing subscriber. Application events go to stdout or
//! to the configured log file; events on the metrics target go to stdout as
//! bare messages so each report line is a plain JSON object. The level filter
//! is reloadable, which is how per-component verbosity overrides take effect.

use crate::config::Config;
use crate::error::MonitoringError;
use crate::logs::level::{validate_component, LevelControl};
use crate::reporter::log::METRICS_TARGET;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, writer::BoxMakeWriter},
    prelude::*,
    reload, EnvFilter, Registry,
};

/// Build the filter directive string from the base filter and per-component
/// overrides. The metrics channel is always enabled.
pub fn directives(base: &str, overrides: &BTreeMap<String, LevelFilter>) -> String {
    let mut directives = vec![base.to_string(), format!("{}=info", METRICS_TARGET)];
    directives.extend(
        overrides
            .iter()
            .map(|(component, level)| format!("{}={}", component, level)),
    );
    directives.join(",")
}

/// # Logging Handle
///
/// Runtime control over the installed subscriber's level filter.
#[derive(Clone)]
pub struct LoggingHandle {
    base: String,
    overrides: Arc<Mutex<BTreeMap<String, LevelFilter>>>,
    reload: reload::Handle<EnvFilter, Registry>,
}

impl LoggingHandle {
    fn apply(&self, overrides: &BTreeMap<String, LevelFilter>) -> Result<(), MonitoringError> {
        let filter = EnvFilter::try_new(directives(&self.base, overrides))
            .map_err(|e| MonitoringError::BadRequest(format!("Invalid log filter: {}", e)))?;
        self.reload
            .reload(filter)
            .map_err(|e| MonitoringError::Config(format!("Cannot reload log filter: {}", e)))
    }
}

impl LevelControl for LoggingHandle {
    fn level(&self, component: &str) -> Option<LevelFilter> {
        self.overrides.lock().ok()?.get(component).copied()
    }

    fn set_level(&self, component: &str, level: Option<LevelFilter>) -> Result<(), MonitoringError> {
        validate_component(component)?;
        let mut overrides = self
            .overrides
            .lock()
            .map_err(|_| MonitoringError::Config("log level table poisoned".to_string()))?;

        let mut updated = overrides.clone();
        match level {
            Some(level) => updated.insert(component.to_string(), level),
            None => updated.remove(component),
        };
        self.apply(&updated)?;
        *overrides = updated;
        Ok(())
    }
}

/// Build the reloadable level filter layer and the handle controlling it.
pub(crate) fn reloadable_filter(
    base: &str,
) -> Result<(reload::Layer<EnvFilter, Registry>, LoggingHandle), MonitoringError> {
    let filter = EnvFilter::try_new(directives(base, &BTreeMap::new()))
        .map_err(|e| MonitoringError::Config(format!("Invalid RUST_LOG '{}': {}", base, e)))?;
    let (layer, reload) = reload::Layer::new(filter);
    let handle = LoggingHandle {
        base: base.to_string(),
        overrides: Arc::new(Mutex::new(BTreeMap::new())),
        reload,
    };
    Ok((layer, handle))
}

/// Install the global subscriber described by `config`.
pub fn init(config: &Config) -> Result<LoggingHandle, MonitoringError> {
    let (filter_layer, handle) = reloadable_filter(&config.log_level)?;

    let (writer, ansi) = match config.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    let app_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_filter(filter_fn(|metadata| metadata.target() != METRICS_TARGET));

    let metrics_layer = fmt::layer()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stdout)
        .with_filter(filter_fn(|metadata| metadata.target() == METRICS_TARGET));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(app_layer)
        .with(metrics_layer)
        .try_init()
        .map_err(|e| MonitoringError::Config(format!("Logging already initialised: {}", e)))?;

    Ok(handle)
}
