//! # Web Author Monitoring
//!
//! Request monitoring for a multi-tenant document-editing web server.
//!
//! ## Features
//!
//! - **Request Classification**: bounded-cardinality labels (`edit`, `doc-load`, `others`)
//! - **Decaying Statistics**: latency timers and error meters over forward-decay reservoirs
//! - **Slow Request Logging**: one structured warning per request above the threshold
//! - **Pluggable Reporters**: UDP collector, cloud monitoring API, or a JSON log channel
//! - **Log Tooling**: rotated log streaming and runtime verbosity overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webauthor_monitoring::{
//!     create_router, Config, InMemoryLevels, MonitoringContext, ReporterScheduler,
//!     ReporterSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_test();
//!     let context = MonitoringContext::from_config(&config, Arc::new(InMemoryLevels::new()));
//!
//!     ReporterScheduler::select(&ReporterSettings::from(&config), context.store.clone()).spawn();
//!
//!     let app = create_router(context, axum::Router::new());
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`classifier`] - request path to label
//! - [`metrics`] - meters, timers, gauges and the shared registry
//! - [`middleware`] - per-request timing and error counting
//! - [`reporter`] - backend selection and the periodic export loop
//! - [`logs`] - rotated log files and verbosity overrides
//! - [`logging`] - tracing subscriber setup
//! - [`server`] - `/monitoring` endpoints

// Core infrastructure
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

// Domain modules
pub mod classifier;
pub mod logs;
pub mod metrics;
pub mod reporter;

#[cfg(feature = "server")]
pub mod middleware;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types for convenience
pub use classifier::{Label, RequestClassifier};
pub use config::Config;
pub use core::http_client::{HttpClientBuilder, HttpClientConfig};
pub use error::MonitoringError;
pub use logging::LoggingHandle;
pub use logs::{InMemoryLevels, LevelControl, LogManager};
pub use metrics::{
    register_memory_gauges, Clock, LatencyTimer, ManualClock, MetricStore, RateMeter,
    RegistrySnapshot, SystemClock,
};
pub use reporter::{Reporter, ReporterScheduler, ReporterSettings};

// Server re-exports (feature-gated)
#[cfg(feature = "server")]
pub use middleware::{monitor_requests, MonitoringMiddleware};

#[cfg(feature = "server")]
pub use server::{create_router, MonitoringContext};

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, MonitoringError>;
