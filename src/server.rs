//! HTTP API over [`CompressionService`].
//!
//! | Method | Path | |
//! |--------|------|---|
//! | GET  | `/health` | liveness |
//! | GET  | `/api/v1/tiers` | tier catalog |
//! | POST | `/api/v1/compress` | multipart upload → 202 `{task_id, session_id}` |
//! | GET  | `/api/v1/status/:task_id` | task status |
//! | GET  | `/api/v1/download/:session_id/:filename?task_id=` | compressed PDF |
//!
//! Errors are JSON `{"error": <code>, "message": <text>}`.

use crate::error::{CompressError, ErrorKind};
use crate::service::CompressionService;
use crate::tier::CompressionTier;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Header carrying the caller's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// How often expired task records are purged while serving.
const PURGE_INTERVAL: Duration = Duration::from_secs(600);

type AppState = Arc<CompressionService>;

impl IntoResponse for CompressError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation | ErrorKind::NotReady => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Storage | ErrorKind::Pipeline | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("Request failed [{}]: {}", self.code(), self);
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Build the router with all routes, the upload size limit and request tracing.
pub fn router(service: AppState) -> Router {
    let body_limit = service.config().max_upload_bytes();
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tiers", get(list_tiers))
        .route("/api/v1/compress", post(compress))
        .route("/api/v1/status/:task_id", get(task_status))
        .route("/api/v1/download/:session_id/:filename", get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind, serve until `shutdown` resolves, and purge expired tasks meanwhile.
pub async fn serve<F>(service: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = service.config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let purger = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                service.purge_expired();
            }
        })
    };

    tracing::info!("PDF compressor listening on {}", addr);
    tracing::info!("  - POST /api/v1/compress");
    tracing::info!("  - GET  /api/v1/status/:task_id");
    tracing::info!("  - GET  /api/v1/download/:session_id/:filename?task_id=");
    tracing::info!("  - GET  /api/v1/tiers");
    tracing::info!("  - GET  /health");

    let result = axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await;
    purger.abort();
    // The purger holds a service handle until it has actually stopped.
    let _ = purger.await;
    result
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_tiers(State(service): State<AppState>) -> impl IntoResponse {
    Json(service.tiers())
}

/// Accept a multipart upload: `pdf` (file), `compression_mode`, `session_id`.
async fn compress(
    State(service): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, CompressError> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut mode: Option<String> = None;
    let mut session: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CompressError::InvalidUpload(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("pdf") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| CompressError::InvalidUpload(e.body_text()))?;
                upload = Some((file_name, data));
            }
            Some("compression_mode") => {
                mode = Some(read_text(field).await?);
            }
            Some("session_id") => {
                session = Some(read_text(field).await?);
            }
            _ => {}
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| CompressError::InvalidUpload("no 'pdf' file part".into()))?;
    if filename.is_empty() {
        return Err(CompressError::InvalidFilename { name: filename });
    }

    let tier = match mode.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.parse::<CompressionTier>()?,
        None => CompressionTier::default(),
    };

    let session = session
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let submission = service
        .submit_upload(session.as_deref(), &filename, &data, tier)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(submission)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, CompressError> {
    field
        .text()
        .await
        .map_err(|e| CompressError::InvalidUpload(e.body_text()))
}

async fn task_status(
    State(service): State<AppState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    Json(service.status(&task_id))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    task_id: Option<String>,
}

async fn download(
    State(service): State<AppState>,
    Path((session_id, filename)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, CompressError> {
    let file = service
        .fetch_result(&session_id, &filename, query.task_id.as_deref())
        .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, file.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.download_name),
        )
        .body(Body::from(file.bytes))
        .map_err(|e| CompressError::Internal(format!("Failed to build response: {}", e)))
}
