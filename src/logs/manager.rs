//! # Log Manager
//!
//! Reads the active log file and its rotated shards, and applies temporary
//! per-component verbosity overrides.

use super::level::{validate_component, LevelControl};
use crate::error::MonitoringError;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, level_filters::LevelFilter};

/// Level applied by [`LogManager::raise_verbosity`].
pub const RAISED_LEVEL: LevelFilter = LevelFilter::TRACE;

/// Rotation ordinal of a shard: the number after the active file's name.
///
/// With an active file named `file`, `file.2` has ordinal 2 while `file`,
/// `file.old` and `file.` have ordinal 0.
pub fn rotation_ordinal(file_name: &str, base_name: &str) -> u64 {
    file_name
        .strip_prefix(base_name)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(0)
}

/// # Log Manager
pub struct LogManager {
    active_file: Option<PathBuf>,
    levels: Arc<dyn LevelControl>,
    /// Level each raised component had before its first raise.
    overrides: Mutex<HashMap<String, Option<LevelFilter>>>,
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("LogManager");
        debug.field("active_file", &self.active_file);
        match self.overrides.try_lock() {
            Ok(overrides) => {
                let mut components: Vec<&String> = overrides.keys().collect();
                components.sort();
                debug.field("overrides", &components)
            }
            Err(_) => debug.field("overrides", &format_args!("<locked>")),
        };
        debug.finish_non_exhaustive()
    }
}

impl LogManager {
    pub fn new(active_file: Option<PathBuf>, levels: Arc<dyn LevelControl>) -> Self {
        Self {
            active_file,
            levels,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_file(&self) -> Result<&Path, MonitoringError> {
        self.active_file
            .as_deref()
            .ok_or(MonitoringError::LogFileNotConfigured)
    }

    /// Copy the active log file verbatim. Returns the number of bytes written.
    pub fn stream_last_day<W: Write>(&self, out: &mut W) -> Result<u64, MonitoringError> {
        let mut file = File::open(self.active_file()?)?;
        Ok(io::copy(&mut file, out)?)
    }

    /// The active file and its shards in streaming order: highest rotation
    /// ordinal first, the active file last.
    pub fn shards(&self) -> Result<Vec<PathBuf>, MonitoringError> {
        let active = self.active_file()?;
        let base_name = active
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MonitoringError::Config(format!("Unusable log file name {:?}", active)))?;
        let dir = match active.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut shards: Vec<(u64, String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            // Follows symlinks, so a linked shard is streamed like a file.
            match fs::metadata(entry.path()) {
                Ok(metadata) if metadata.is_file() => {}
                _ => continue,
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(base_name) {
                shards.push((rotation_ordinal(&name, base_name), name, entry.path()));
            }
        }

        // Ascending by ordinal then reversed, so equal ordinals fall back to
        // reverse name order.
        shards.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        shards.reverse();
        Ok(shards.into_iter().map(|(_, _, path)| path).collect())
    }

    /// Concatenate every shard in [`shards`](Self::shards) order. Returns the
    /// number of bytes written.
    pub fn stream_all_logs<W: Write>(&self, out: &mut W) -> Result<u64, MonitoringError> {
        let mut total = 0;
        for shard in self.shards()? {
            let mut file = File::open(&shard)?;
            total += io::copy(&mut file, out)?;
        }
        Ok(total)
    }

    fn lock_overrides(&self) -> Result<MutexGuard<'_, HashMap<String, Option<LevelFilter>>>, MonitoringError> {
        self.overrides
            .lock()
            .map_err(|_| MonitoringError::Config("verbosity override table poisoned".to_string()))
    }

    /// Set `component` to the most verbose level, remembering its current
    /// level. Raising an already raised component keeps the level recorded
    /// by the first raise.
    pub fn raise_verbosity(&self, component: &str) -> Result<(), MonitoringError> {
        validate_component(component)?;
        let mut overrides = self.lock_overrides()?;
        let previous = self.levels.level(component);
        self.levels.set_level(component, Some(RAISED_LEVEL))?;
        overrides.entry(component.to_string()).or_insert(previous);
        info!(component, "Raised log verbosity");
        Ok(())
    }

    /// Restore the level recorded for `component`. Fails with
    /// [`MonitoringError::NoOverride`] when nothing was recorded.
    pub fn reset(&self, component: &str) -> Result<(), MonitoringError> {
        let mut overrides = self.lock_overrides()?;
        let previous = overrides
            .remove(component)
            .ok_or_else(|| MonitoringError::NoOverride(component.to_string()))?;
        if let Err(e) = self.levels.set_level(component, previous) {
            overrides.insert(component.to_string(), previous);
            return Err(e);
        }
        info!(component, "Restored log verbosity");
        Ok(())
    }

    /// Restore every recorded component and clear all records. Returns the
    /// number of components restored.
    pub fn reset_all(&self) -> Result<usize, MonitoringError> {
        let mut overrides = self.lock_overrides()?;
        let mut first_error = None;
        let mut restored = 0;
        for (component, previous) in overrides.drain() {
            match self.levels.set_level(&component, previous) {
                Ok(()) => restored += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        info!(restored, "Restored all log verbosity overrides");
        match first_error {
            Some(e) => Err(e),
            None => Ok(restored),
        }
    }

    /// Components currently raised, sorted.
    pub fn overridden_components(&self) -> Vec<String> {
        let mut components: Vec<String> = match self.overrides.lock() {
            Ok(overrides) => overrides.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        components.sort();
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::level::InMemoryLevels;

    #[test]
    fn test_rotation_ordinal() {
        assert_eq!(rotation_ordinal("file", "file"), 0);
        assert_eq!(rotation_ordinal("file.1", "file"), 1);
        assert_eq!(rotation_ordinal("file.12", "file"), 12);
        assert_eq!(rotation_ordinal("file.old", "file"), 0);
        assert_eq!(rotation_ordinal("oxygen.log.3", "oxygen.log"), 3);
    }

    fn manager(levels: Arc<InMemoryLevels>) -> LogManager {
        LogManager::new(None, levels)
    }

    #[test]
    fn test_missing_log_file_is_reported() {
        let manager = manager(Arc::new(InMemoryLevels::new()));
        let mut out = Vec::new();
        assert!(matches!(
            manager.stream_last_day(&mut out),
            Err(MonitoringError::LogFileNotConfigured)
        ));
    }

    #[test]
    fn test_raise_and_reset_restore_previous_level() {
        let levels = Arc::new(InMemoryLevels::new().with_level("app", LevelFilter::WARN));
        let manager = manager(levels.clone());

        manager.raise_verbosity("app").unwrap();
        assert_eq!(levels.level("app"), Some(RAISED_LEVEL));

        manager.reset("app").unwrap();
        assert_eq!(levels.level("app"), Some(LevelFilter::WARN));
        assert!(manager.overridden_components().is_empty());
    }

    #[test]
    fn test_second_raise_keeps_original_level() {
        let levels = Arc::new(InMemoryLevels::new().with_level("app", LevelFilter::ERROR));
        let manager = manager(levels.clone());

        manager.raise_verbosity("app").unwrap();
        manager.raise_verbosity("app").unwrap();
        manager.reset("app").unwrap();
        assert_eq!(levels.level("app"), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_reset_without_override_is_rejected() {
        let manager = manager(Arc::new(InMemoryLevels::new()));
        assert!(matches!(
            manager.reset("never-raised"),
            Err(MonitoringError::NoOverride(name)) if name == "never-raised"
        ));
    }

    #[test]
    fn test_reset_all_restores_inherited_levels() {
        let levels = Arc::new(InMemoryLevels::new().with_level("a", LevelFilter::INFO));
        let manager = manager(levels.clone());

        manager.raise_verbosity("a").unwrap();
        manager.raise_verbosity("b").unwrap();
        assert_eq!(manager.overridden_components(), vec!["a", "b"]);

        assert_eq!(manager.reset_all().unwrap(), 2);
        assert_eq!(levels.level("a"), Some(LevelFilter::INFO));
        assert_eq!(levels.level("b"), None);
        assert!(manager.overridden_components().is_empty());
    }

    #[test]
    fn test_concurrent_raises_record_one_original() {
        let levels = Arc::new(InMemoryLevels::new().with_level("hot", LevelFilter::WARN));
        let manager = Arc::new(manager(levels.clone()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || manager.raise_verbosity("hot").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        manager.reset("hot").unwrap();
        assert_eq!(levels.level("hot"), Some(LevelFilter::WARN));
    }

    /// Rejects every change, like a subscriber whose filter cannot reload.
    struct RejectingLevels;

    impl LevelControl for RejectingLevels {
        fn level(&self, _component: &str) -> Option<LevelFilter> {
            Some(LevelFilter::WARN)
        }

        fn set_level(&self, _component: &str, _level: Option<LevelFilter>) -> Result<(), MonitoringError> {
            Err(MonitoringError::Config("Cannot reload log filter".to_string()))
        }
    }

    #[test]
    fn test_failed_raise_records_nothing() {
        let manager = LogManager::new(None, Arc::new(RejectingLevels));
        assert!(matches!(manager.raise_verbosity("app"), Err(MonitoringError::Config(_))));
        assert!(manager.overridden_components().is_empty());
        assert!(matches!(manager.reset("app"), Err(MonitoringError::NoOverride(_))));
    }

    #[test]
    fn test_debug_does_not_block_on_held_lock() {
        let manager = manager(Arc::new(InMemoryLevels::new()));
        manager.raise_verbosity("b").unwrap();
        manager.raise_verbosity("a").unwrap();
        assert!(format!("{:?}", manager).contains(r#"overrides: ["a", "b"]"#));

        let _held = manager.overrides.lock().unwrap();
        assert!(format!("{:?}", manager).contains("overrides: <locked>"));
    }
}
