//! # wamon
//!
//! Standalone monitoring server: the `/monitoring` endpoints plus a fallback
//! that answers 404 for host traffic, all behind the request middleware.

use axum::{http::StatusCode, Router};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use webauthor_monitoring::{
    create_router, logging, register_memory_gauges, Config, MonitoringContext, ReporterScheduler,
    ReporterSettings,
};

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();
    let levels = logging::init(&config)?;

    let context = MonitoringContext::from_config(&config, Arc::new(levels));
    if let Err(e) = register_memory_gauges(&context.store) {
        warn!(error = %e, "Memory gauges not registered");
    }

    let reporter = ReporterScheduler::select(&ReporterSettings::from(&config), context.store.clone());
    let reporter_task = reporter.spawn();

    let host = Router::new().fallback(|| async { StatusCode::NOT_FOUND });
    let app = create_router(context, host);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("wamon listening on http://{}", listener.local_addr()?);
    info!(
        context_path = %config.context_path,
        edit_route = %config.edit_route,
        doc_load_route = %config.doc_load_route,
        "Monitoring routes configured"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reporter_task.abort();
    info!("wamon stopped");
    Ok(())
}
