//! `/monitoring` endpoints and host traffic through the full router.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tracing::level_filters::LevelFilter;
use webauthor_monitoring::{
    create_router, logs::RAISED_LEVEL, Config, InMemoryLevels, LevelControl, MonitoringContext,
};

struct Harness {
    router: Router,
    levels: Arc<InMemoryLevels>,
    context: MonitoringContext,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("oxygen.log"), "today\n").unwrap();
    std::fs::write(dir.path().join("oxygen.log.1"), "yesterday\n").unwrap();

    let mut config = Config::for_test();
    config.log_file = Some(dir.path().join("oxygen.log").to_string_lossy().into_owned());

    let levels = Arc::new(InMemoryLevels::new().with_level("webauthor_monitoring", LevelFilter::INFO));
    let context = MonitoringContext::from_config(&config, levels.clone());

    let host = Router::new()
        .route(
            "/oxygen-xml-web-author/rest/v1/edit/{doc}/insert",
            get(|| async { StatusCode::OK }),
        )
        .route("/oxygen-xml-web-author/app.js", get(|| async { "js" }));

    Harness {
        router: create_router(context.clone(), host),
        levels,
        context,
        _dir: dir,
    }
}

async fn call(router: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = call(&h.router, Method::GET, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_host_traffic_shows_up_in_metrics() {
    let h = harness();
    let response = call(&h.router, Method::GET, "/oxygen-xml-web-author/rest/v1/edit/doc1/insert").await;
    assert_eq!(response.status(), StatusCode::OK);
    call(&h.router, Method::GET, "/oxygen-xml-web-author/app.js").await;

    let response = call(&h.router, Method::GET, "/monitoring/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();

    assert!(body["timestamp"].as_u64().is_some());
    assert_eq!(body["metrics"]["duration.edit"]["count"], 1);
    assert_eq!(body["metrics"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_monitoring_endpoints_are_not_monitored() {
    let h = harness();
    call(&h.router, Method::GET, "/monitoring/threads").await;
    call(&h.router, Method::GET, "/monitoring/metrics").await;
    assert!(h.context.store.is_empty());
}

#[tokio::test]
async fn test_threads_listing() {
    let h = harness();
    let response = call(&h.router, Method::GET, "/monitoring/threads").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.is_empty());
}

#[tokio::test]
async fn test_logs_last_day() {
    let h = harness();
    let response = call(&h.router, Method::GET, "/monitoring/logs/lastday").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "today\n");
}

#[tokio::test]
async fn test_logs_all_is_a_download() {
    let h = harness();
    let response = call(&h.router, Method::GET, "/monitoring/logs/all").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"oxygen.log\""
    );
    assert_eq!(body_text(response).await, "yesterday\ntoday\n");
}

#[tokio::test]
async fn test_logs_all_streams_large_shards_in_order() {
    let dir = TempDir::new().unwrap();
    let old = "a".repeat(200_000);
    let newer = "b".repeat(150_000);
    let active = "c".repeat(70_001);
    std::fs::write(dir.path().join("oxygen.log.2"), &old).unwrap();
    std::fs::write(dir.path().join("oxygen.log.1"), &newer).unwrap();
    std::fs::write(dir.path().join("oxygen.log"), &active).unwrap();

    let mut config = Config::for_test();
    config.log_file = Some(dir.path().join("oxygen.log").to_string_lossy().into_owned());
    let context = MonitoringContext::from_config(&config, Arc::new(InMemoryLevels::new()));
    let router = create_router(context, Router::new());

    let response = call(&router, Method::GET, "/monitoring/logs/all").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert_eq!(body.len(), old.len() + newer.len() + active.len());
    assert_eq!(body, format!("{}{}{}", old, newer, active));

    let response = call(&router, Method::GET, "/monitoring/logs/lastday").await;
    assert_eq!(body_text(response).await, active);
}

#[tokio::test]
async fn test_missing_active_file_fails_before_streaming() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::for_test();
    config.log_file = Some(dir.path().join("absent.log").to_string_lossy().into_owned());
    let context = MonitoringContext::from_config(&config, Arc::new(InMemoryLevels::new()));
    let router = create_router(context, Router::new());

    let response = call(&router, Method::GET, "/monitoring/logs/lastday").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"]["message"].as_str().is_some());
}

#[tokio::test]
async fn test_logs_without_log_file() {
    let context = MonitoringContext::from_config(&Config::for_test(), Arc::new(InMemoryLevels::new()));
    let router = create_router(context, Router::new());

    let response = call(&router, Method::GET, "/monitoring/logs/lastday").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"]["message"].as_str().is_some());
}

#[tokio::test]
async fn test_set_debug_and_reset() {
    let h = harness();

    let response = call(&h.router, Method::POST, "/monitoring/logs/set_debug?name=webauthor_monitoring").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.levels.level("webauthor_monitoring"), Some(RAISED_LEVEL));

    let response = call(&h.router, Method::POST, "/monitoring/logs/reset?name=webauthor_monitoring").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.levels.level("webauthor_monitoring"), Some(LevelFilter::INFO));

    let response = call(&h.router, Method::POST, "/monitoring/logs/reset?name=webauthor_monitoring").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reset_all() {
    let h = harness();
    call(&h.router, Method::POST, "/monitoring/logs/set_debug?name=a").await;
    call(&h.router, Method::POST, "/monitoring/logs/set_debug?name=b").await;

    let response = call(&h.router, Method::POST, "/monitoring/logs/reset").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["reset"], serde_json::json!(["a", "b"]));
    assert_eq!(h.levels.level("a"), None);
    assert!(h.context.log_manager.overridden_components().is_empty());
}

#[tokio::test]
async fn test_set_debug_requires_name() {
    let h = harness();
    let response = call(&h.router, Method::POST, "/monitoring/logs/set_debug").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
