//! HTTP surface over the scan engine. Scans are synchronous filesystem and
//! OS work, so every handler pushes the engine call onto the blocking pool.

use crate::engine::{ScanEngine, ScanMode, ScanOutcome};
use crate::error::ScanError;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upload cap for `/scan_file`. The extractor's 2 MB default is too small for
/// the executables and documents submitted for scanning.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn internal(err: impl ToString) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::TargetNotFound { .. } => ApiError::NotFound(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message
        }));

        (status, body).into_response()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScanEngine>,
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileScanQuery {
    path: String,
    mode: Option<String>,
}

fn requested_mode(mode: &Option<String>) -> ScanMode {
    mode.as_deref().map(ScanMode::from_name).unwrap_or_default()
}

fn success_body(outcome: ScanOutcome) -> Json<serde_json::Value> {
    let (records, diagnostics) = outcome.into_parts();
    Json(json!({
        "status": "success",
        "threats": records,
        "diagnostics": diagnostics
    }))
}

async fn scan_processes(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let mode = requested_mode(&query.mode);
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.scan_processes(mode))
        .await
        .map_err(ApiError::internal)??;
    Ok(success_body(outcome))
}

async fn scan_files(
    State(state): State<AppState>,
    Query(query): Query<FileScanQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let mode = requested_mode(&query.mode);
    let engine = state.engine.clone();
    let target = std::path::PathBuf::from(query.path);
    let outcome = tokio::task::spawn_blocking(move || engine.scan_files(&target, mode))
        .await
        .map_err(ApiError::internal)??;
    Ok(success_body(outcome))
}

async fn scan_logs(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let mode = requested_mode(&query.mode);
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.scan_logs(mode))
        .await
        .map_err(ApiError::internal)??;
    Ok(success_body(outcome))
}

/// Scan an uploaded file. The payload is written to a temp file that lives
/// only for the duration of the scan; when `original_path` is sent, each
/// record is rewritten to carry the path the client knew the content by.
async fn scan_upload(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mode = requested_mode(&query.mode);

    let mut payload: Option<Bytes> = None;
    let mut original_path: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                payload = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.to_string()))?,
                );
            }
            Some("original_path") => {
                original_path = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.to_string()))?,
                );
            }
            _ => {}
        }
    }
    let Some(payload) = payload else {
        return Err(ApiError::BadRequest(
            "multipart field `file` is required".to_string(),
        ));
    };

    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || -> ApiResult<ScanOutcome> {
        let mut tmp = tempfile::NamedTempFile::new().map_err(ApiError::internal)?;
        tmp.write_all(&payload).map_err(ApiError::internal)?;
        Ok(engine.scan_files(tmp.path(), mode)?)
    })
    .await
    .map_err(ApiError::internal)??;

    let (mut records, diagnostics) = outcome.into_parts();
    if let Some(original) = &original_path {
        for record in &mut records {
            record.set_original_path(original);
        }
    }
    Ok(Json(json!({
        "status": "success",
        "threats": records,
        "diagnostics": diagnostics
    })))
}

/// Create the router with all scan routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/scan_processes", get(scan_processes))
        .route("/scan_files", get(scan_files))
        .route("/scan_logs", get(scan_logs))
        .route(
            "/scan_file",
            post(scan_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, engine: Arc<ScanEngine>) -> std::io::Result<()> {
    let app = create_router(AppState { engine });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
