//! # Level Control
//!
//! The seam between the log manager and whatever owns the live log levels.

use crate::error::MonitoringError;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;

/// Read and change the explicit level of a named component (a tracing target
/// prefix). `None` means the component has no level of its own and follows
/// the global default.
pub trait LevelControl: Send + Sync {
    fn level(&self, component: &str) -> Option<LevelFilter>;

    fn set_level(&self, component: &str, level: Option<LevelFilter>) -> Result<(), MonitoringError>;
}

/// Component names accepted by the level controls: tracing target paths.
pub fn validate_component(component: &str) -> Result<(), MonitoringError> {
    let valid = !component.is_empty()
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(MonitoringError::BadRequest(format!(
            "Invalid component name '{}'",
            component
        )))
    }
}

/// Level table kept in memory only; nothing is logged differently.
#[derive(Debug, Default)]
pub struct InMemoryLevels {
    levels: Mutex<HashMap<String, LevelFilter>>,
}

impl InMemoryLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `component` already set to `level`.
    pub fn with_level(self, component: &str, level: LevelFilter) -> Self {
        if let Ok(mut levels) = self.levels.lock() {
            levels.insert(component.to_string(), level);
        }
        self
    }
}

impl LevelControl for InMemoryLevels {
    fn level(&self, component: &str) -> Option<LevelFilter> {
        self.levels.lock().ok()?.get(component).copied()
    }

    fn set_level(&self, component: &str, level: Option<LevelFilter>) -> Result<(), MonitoringError> {
        let mut levels = self
            .levels
            .lock()
            .map_err(|_| MonitoringError::Config("level table poisoned".to_string()))?;
        match level {
            Some(level) => levels.insert(component.to_string(), level),
            None => levels.remove(component),
        };
        Ok(())
    }
}
