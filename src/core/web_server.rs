//! HTTP surface for search and download.
//!
//! - `GET  /api/youtube/search?query=...` returns `[{"videoId", "title"}]`
//! - `POST /api/youtube/download?videoId=&title=&format=` streams the file
//! - `GET  /health`

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

use crate::core::error::AppError;
use crate::core::utils::attachment_filename;
use crate::download::{DownloadError, MediaFormat};
use crate::service::MediaService;
use crate::storage::cleanup::FileLease;

/// Shared state for the web server.
#[derive(Clone)]
struct WebState {
    service: MediaService,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadParams {
    video_id: Option<String>,
    title: Option<String>,
    format: Option<String>,
}

/// Builds the router; split out so tests can serve it on an ephemeral port.
pub fn router(service: MediaService) -> Router {
    Router::new()
        .route("/api/youtube/search", get(search_handler))
        .route("/api/youtube/download", post(download_handler))
        .route("/health", get(health_handler))
        .with_state(WebState { service })
}

/// Start the web server and serve until the process exits.
pub async fn start_web_server(host: &str, port: u16, service: MediaService) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    log::info!("Starting web server on http://{}", listener.local_addr()?);
    log::info!("  /api/youtube/search    - Search (GET, ?query=)");
    log::info!("  /api/youtube/download  - Download (POST, ?videoId=&title=&format=)");
    log::info!("  /health                - Health check");

    axum::serve(listener, router(service)).await?;
    Ok(())
}

/// GET /api/youtube/search
async fn search_handler(State(state): State<WebState>, Query(params): Query<SearchParams>) -> Response {
    let Some(query) = params.query else {
        return error_response(&AppError::Validation("missing query parameter".to_string()));
    };

    match state.service.search(&query).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /api/youtube/download
async fn download_handler(State(state): State<WebState>, Query(params): Query<DownloadParams>) -> Response {
    let (Some(video_id), Some(title), Some(format)) = (params.video_id, params.title, params.format) else {
        return error_response(&AppError::Validation(
            "videoId, title and format are required".to_string(),
        ));
    };

    match state.service.download(&video_id, &title, &format).await {
        Ok(lease) => match file_response(lease).await {
            Ok(response) => response,
            Err(e) => error_response(&e),
        },
        Err(e) => error_response(&e),
    }
}

/// GET /health
///
/// Reports whether search is configured, the search cache counters and the
/// number of downloads in flight.
async fn health_handler(State(state): State<WebState>) -> impl IntoResponse {
    let service = &state.service;
    Json(json!({
        "status": "ok",
        "search_enabled": service.search_enabled(),
        "search_cache": service.cache_stats().await,
        "downloads_in_flight": service.downloads().in_flight(),
    }))
}

/// Streams the leased file. The lease lives inside the body, so cleanup is
/// scheduled only after the client finished reading or went away.
async fn file_response(lease: FileLease) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(lease.path()).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            AppError::NotFound(format!("file {} no longer exists", lease.path().display()))
        } else {
            AppError::Io(e)
        }
    })?;

    let content_type = lease
        .path()
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse::<MediaFormat>().ok())
        .map_or("application/octet-stream", MediaFormat::mime);
    let disposition = format!("attachment; filename=\"{}\"", attachment_filename(&lease.file().file_name()));
    let size = lease.size();

    let mut response = Response::new(Body::from_stream(ReaderStream::new(LeasedFile { file, _lease: lease })));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

struct LeasedFile {
    file: tokio::fs::File,
    _lease: FileLease,
}

impl AsyncRead for LeasedFile {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        AppError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Download(DownloadError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        AppError::Download(DownloadError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        AppError::Download(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AppError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        log::error!("Request failed [{}]: {}", err.category(), err);
    } else {
        log::info!("Request rejected [{}]: {}", err.category(), err);
    }
    (status, Json(json!({ "error": err.to_string(), "category": err.category() }))).into_response()
}
