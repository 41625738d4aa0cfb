//! # Server Module
//!
//! Mounts the monitoring endpoints next to the host application's routes and
//! wraps everything with the request monitoring middleware.

pub mod handlers;
pub mod state;

pub use state::MonitoringContext;

use crate::middleware::monitor_requests;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

/// Routes served under `/monitoring`.
pub fn monitoring_routes(context: MonitoringContext) -> Router {
    Router::new()
        .route("/threads", get(handlers::threads))
        .route("/metrics", get(handlers::metrics))
        .route("/logs/lastday", get(handlers::logs_last_day))
        .route("/logs/all", get(handlers::logs_all))
        .route("/logs/set_debug", post(handlers::set_debug))
        .route("/logs/reset", post(handlers::reset))
        .with_state(context)
}

/// Combine the host application `app` with the monitoring endpoints. Every
/// request, including those to `app`, passes through the monitoring
/// middleware.
pub fn create_router(context: MonitoringContext, app: Router) -> Router {
    let middleware = context.middleware();

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/monitoring", monitoring_routes(context))
        .merge(app)
        .layer(
            ServiceBuilder::new()
                // Tracing middleware - logs HTTP requests and responses
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(from_fn_with_state(middleware, monitor_requests)),
        )
}
