//! # Monitoring Handlers
//!
//! Administrative endpoints under `/monitoring`. Log downloads are streamed
//! from the files rather than buffered.

use super::MonitoringContext;
use crate::{error::MonitoringError, logs::ALL_LOGS_DOWNLOAD_NAME};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json as JsonResponse, Response},
};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Query string of the verbosity endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ComponentQuery {
    pub name: Option<String>,
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    let health_status = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "webauthor-monitoring",
        "version": env!("CARGO_PKG_VERSION")
    });

    (StatusCode::OK, JsonResponse(health_status))
}

/// List the process threads, one `<id> <name>` line each.
pub fn thread_listing() -> String {
    let mut lines: Vec<(u64, String)> = match std::fs::read_dir("/proc/self/task") {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let id = entry.file_name().to_str()?.parse::<u64>().ok()?;
                let name = std::fs::read_to_string(entry.path().join("comm"))
                    .map(|comm| comm.trim_end().to_string())
                    .unwrap_or_default();
                Some((id, name))
            })
            .collect(),
        Err(_) => Vec::new(),
    };

    if lines.is_empty() {
        let current = std::thread::current();
        lines.push((0, current.name().unwrap_or("main").to_string()));
    }
    lines.sort();

    lines
        .into_iter()
        .map(|(id, name)| format!("{} {}\n", id, name))
        .collect()
}

/// `GET /monitoring/threads`
pub async fn threads() -> Response {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], thread_listing()).into_response()
}

/// `GET /monitoring/metrics`
pub async fn metrics(State(context): State<MonitoringContext>) -> Result<Response, MonitoringError> {
    let snapshot = context.store.snapshot();
    let body = serde_json::to_string_pretty(&snapshot)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Open every file up front so a missing file fails the request before the
/// first byte is sent.
async fn open_all(paths: Vec<PathBuf>) -> Result<Vec<File>, MonitoringError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(File::open(&path).await?);
    }
    Ok(files)
}

fn stream_files(files: Vec<File>) -> Body {
    Body::from_stream(stream::iter(files).flat_map(ReaderStream::new))
}

/// `GET /monitoring/logs/lastday`
pub async fn logs_last_day(State(context): State<MonitoringContext>) -> Result<Response, MonitoringError> {
    let active = context.log_manager.active_file()?.to_path_buf();
    let files = open_all(vec![active]).await?;
    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], stream_files(files)).into_response())
}

/// `GET /monitoring/logs/all`
pub async fn logs_all(State(context): State<MonitoringContext>) -> Result<Response, MonitoringError> {
    let manager = context.log_manager.clone();
    let shards = tokio::task::spawn_blocking(move || manager.shards())
        .await
        .map_err(|e| MonitoringError::Io(std::io::Error::other(e)))??;
    let files = open_all(shards).await?;
    let disposition = format!("attachment; filename=\"{}\"", ALL_LOGS_DOWNLOAD_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, TEXT_PLAIN.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        stream_files(files),
    )
        .into_response())
}

/// `POST /monitoring/logs/set_debug?name=X`
pub async fn set_debug(
    State(context): State<MonitoringContext>,
    Query(query): Query<ComponentQuery>,
) -> Result<Response, MonitoringError> {
    let name = query
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| MonitoringError::BadRequest("Missing 'name' parameter".to_string()))?;
    context.log_manager.raise_verbosity(&name)?;
    Ok(JsonResponse(serde_json::json!({ "raised": name })).into_response())
}

/// `POST /monitoring/logs/reset[?name=X]`
pub async fn reset(
    State(context): State<MonitoringContext>,
    Query(query): Query<ComponentQuery>,
) -> Result<Response, MonitoringError> {
    match query.name.filter(|name| !name.is_empty()) {
        Some(name) => {
            context.log_manager.reset(&name)?;
            Ok(JsonResponse(serde_json::json!({ "reset": [name] })).into_response())
        }
        None => {
            let components = context.log_manager.overridden_components();
            context.log_manager.reset_all()?;
            Ok(JsonResponse(serde_json::json!({ "reset": components })).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_listing_is_never_empty() {
        let listing = thread_listing();
        assert!(!listing.is_empty());
        assert!(listing.lines().all(|line| line.split_once(' ').is_some()));
    }
}
