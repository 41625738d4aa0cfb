//! # Log Tooling
//!
//! Access to the rotated application log files and runtime verbosity
//! overrides. All operations are blocking; async callers should run them on
//! a blocking thread.

pub mod level;
pub mod manager;

pub use level::{InMemoryLevels, LevelControl};
pub use manager::{rotation_ordinal, LogManager, RAISED_LEVEL};

/// File name offered when downloading the concatenated logs.
pub const ALL_LOGS_DOWNLOAD_NAME: &str = "oxygen.log";
