use crate::config::Config;
use crate::errors::AppError;
use crate::models::{StartSyncRequest, SyncJobStatus, SyncMode};
use crate::sync_job::{SyncOrchestrator, SyncStatusReader};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Starts sync jobs; holds the only status sender.
    pub sync: SyncOrchestrator,
    /// Read-only view of the current job.
    pub status: SyncStatusReader,
}

impl AppState {
    pub fn new(config: Config, sync: SyncOrchestrator) -> Self {
        let status = sync.status();
        Self {
            config,
            sync,
            status,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, start_sync, sync_status),
    components(schemas(SyncJobStatus, SyncMode, StartSyncRequest)),
    tags((name = "sync", description = "Legislator data sync jobs"))
)]
pub struct ApiDoc;

/// Health check endpoint.
///
/// Returns the service status, version, and whether a sync is running.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-lawgg-sync",
            "version": env!("CARGO_PKG_VERSION"),
            "sync_running": state.status.snapshot().running
        })),
    )
}

/// POST /api/v1/sync
///
/// Starts a background sync job. The body is optional; without one a full
/// sync runs. Returns 409 while another job is running.
#[utoipa::path(
    post,
    path = "/api/v1/sync",
    tag = "sync",
    request_body(content = StartSyncRequest, description = "Optional job mode", content_type = "application/json"),
    responses(
        (status = 202, description = "Job started", body = SyncJobStatus),
        (status = 400, description = "Malformed body"),
        (status = 409, description = "A job is already running")
    )
)]
pub async fn start_sync(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SyncJobStatus>), AppError> {
    let request = parse_start_request(&body)?;
    tracing::info!("POST /api/v1/sync - mode: {:?}", request.mode);

    let status = state.sync.start(request.mode)?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// GET /api/v1/sync/status
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    tag = "sync",
    responses((status = 200, description = "Current job status", body = SyncJobStatus))
)]
pub async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SyncJobStatus> {
    Json(state.status.snapshot())
}

fn parse_start_request(body: &[u8]) -> Result<StartSyncRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartSyncRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid sync request: {}", e)))
}
