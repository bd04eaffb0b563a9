//! Axum routes for the control-surface API: dataset CRUD, the diff review
//! queue, quality-check dispatch/poll, dataset reset, and health probes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleError;
use crate::quality::geometry::to_geojson;
use crate::scheduler::DispatchError;
use crate::source::ExternalSourceReader;
use crate::store::{DatasetStore, DiffFilter, DiffStore, FindingStore, SnapshotStore};
use crate::store::PostgresStore;
use crate::types::{
    CheckCategory, CheckResult, ConnectionDescriptor, Dataset, DatasetId, Diff, DiffId, DiffType, FindingSummary,
    ReviewStatus,
};
use crate::GEOWATCH_SCHEMA_VERSION;

use super::state::ServiceState;

/// Type alias for the service state the binary wires up.
pub type AppState = ServiceState<PostgresStore, ExternalSourceReader>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Structured error response with a machine-readable code, mirroring the
/// teacher's `ErrorResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self { error: error.into(), code: code.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(code = %self.code, error = %self.error, "request error");
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

fn err(status: StatusCode, code: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse::new(code, message)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDatasetRequest {
    pub name: String,
    pub connection: ConnectionDescriptor,
    #[serde(default)]
    pub check_interval_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDatasetRequest {
    pub name: Option<String>,
    pub connection: Option<ConnectionDescriptor>,
    pub check_interval_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetListResponse {
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListDiffsQuery {
    pub dataset_id: Option<DatasetId>,
    pub status: Option<ReviewStatus>,
    #[serde(rename = "type")]
    pub diff_type: Option<DiffType>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffListResponse {
    pub diffs: Vec<Diff>,
}

/// Diff detail with old/new geometry expanded to GeoJSON.
#[derive(Debug, Clone, Serialize)]
pub struct DiffDetailResponse {
    #[serde(flatten)]
    pub diff: Diff,
    pub old_geometry: Option<serde_json::Value>,
    pub new_geometry: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub status: ReviewStatus,
    pub reviewer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchReviewEntry {
    pub diff_id: DiffId,
    pub status: ReviewStatus,
    pub reviewer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchReviewRequest {
    pub reviews: Vec<BatchReviewEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReviewFailure {
    pub diff_id: DiffId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReviewResponse {
    pub reviewed: Vec<Diff>,
    pub failed: Vec<BatchReviewFailure>,
}

/// A single `(category, result)` tally, since `FindingSummary`'s tuple key
/// can't be serialised as a JSON object key directly.
#[derive(Debug, Clone, Serialize)]
pub struct FindingSummaryEntry {
    pub category: CheckCategory,
    pub result: CheckResult,
    pub count: u64,
}

fn summary_to_entries(summary: &FindingSummary) -> Vec<FindingSummaryEntry> {
    summary
        .iter()
        .map(|((category, result), count)| FindingSummaryEntry { category: *category, result: *result, count: *count })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityCheckStatusResponse {
    pub dataset_name: String,
    pub state: crate::types::RunState,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub progress: crate::types::Progress,
    pub error: Option<String>,
    pub summary: Option<Vec<FindingSummaryEntry>>,
}

impl From<crate::types::QualityCheckStatus> for QualityCheckStatusResponse {
    fn from(s: crate::types::QualityCheckStatus) -> Self {
        Self {
            dataset_name: s.dataset_name,
            state: s.state,
            started_at: s.started_at,
            completed_at: s.completed_at,
            progress: s.progress,
            error: s.error,
            summary: s.summary.as_ref().map(summary_to_entries),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub schema_version: String,
    pub database_connected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
}

// ============================================================================
// Dataset handlers
// ============================================================================

async fn register_dataset_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterDatasetRequest>,
) -> Result<Json<Dataset>, (StatusCode, Json<ErrorResponse>)> {
    let interval = request.check_interval_minutes.unwrap_or(state.config.default_check_interval_minutes);
    let dataset = Dataset::register(request.name, request.connection, interval);
    let created = DatasetStore::create(&*state.store, dataset)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?;
    Ok(Json(created))
}

async fn update_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DatasetId>,
    Json(request): Json<UpdateDatasetRequest>,
) -> Result<Json<Dataset>, (StatusCode, Json<ErrorResponse>)> {
    let mut dataset = DatasetStore::get(&*state.store, &id)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", format!("dataset {id} is not registered")))?;

    if let Some(name) = request.name {
        dataset.name = name;
    }
    if let Some(connection) = request.connection {
        dataset.connection = connection;
    }
    if let Some(interval) = request.check_interval_minutes {
        dataset.check_interval_minutes = interval;
    }

    let updated = DatasetStore::update(&*state.store, dataset)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?;
    Ok(Json(updated))
}

async fn deactivate_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DatasetId>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    DatasetStore::deactivate(&*state.store, &id)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_datasets_handler(State(state): State<Arc<AppState>>) -> Result<Json<DatasetListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let datasets = DatasetStore::list_all(&*state.store)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?;
    Ok(Json(DatasetListResponse { datasets }))
}

async fn get_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DatasetId>,
) -> Result<Json<Dataset>, (StatusCode, Json<ErrorResponse>)> {
    let dataset = DatasetStore::get(&*state.store, &id)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", format!("dataset {id} is not registered")))?;
    Ok(Json(dataset))
}

async fn reset_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DatasetId>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    if DatasetStore::get(&*state.store, &id)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?
        .is_none()
    {
        return Err(err(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", format!("dataset {id} is not registered")));
    }
    state.lifecycle.reset_dataset(id).await.map_err(|e| match e {
        LifecycleError::Dataset(e) => err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()),
        LifecycleError::Snapshot(e) => err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()),
        LifecycleError::Diff(e) => err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()),
        LifecycleError::Finding(e) => err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()),
    })?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Diff handlers
// ============================================================================

async fn list_diffs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDiffsQuery>,
) -> Result<Json<DiffListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let filter = DiffFilter {
        dataset_id: query.dataset_id,
        review_status: query.status,
        diff_type: query.diff_type,
        limit: query.limit.unwrap_or(100),
        offset: query.offset.unwrap_or(0),
    };
    let diffs = DiffStore::list(&*state.store, filter)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?;
    Ok(Json(DiffListResponse { diffs }))
}

async fn get_diff_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DiffId>,
) -> Result<Json<DiffDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let diff = DiffStore::get(&*state.store, &id)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "DIFF_NOT_FOUND", format!("diff {id} does not exist")))?;

    let mut old_geometry = None;
    if let Some(old_id) = diff.old_snapshot_id {
        if let Some(snap) = SnapshotStore::get(&*state.store, &old_id)
            .await
            .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?
        {
            old_geometry = to_geojson(&snap.geometry_wkb);
        }
    }
    let mut new_geometry = None;
    if let Some(new_id) = diff.new_snapshot_id {
        if let Some(snap) = SnapshotStore::get(&*state.store, &new_id)
            .await
            .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string()))?
        {
            new_geometry = to_geojson(&snap.geometry_wkb);
        }
    }

    Ok(Json(DiffDetailResponse { diff, old_geometry, new_geometry }))
}

async fn review_diff_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DiffId>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Diff>, (StatusCode, Json<ErrorResponse>)> {
    let updated = DiffStore::update_review(&*state.store, &id, request.status, request.reviewer)
        .await
        .map_err(|e| err(StatusCode::BAD_REQUEST, "REVIEW_REJECTED", e.to_string()))?;
    Ok(Json(updated))
}

async fn batch_review_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchReviewRequest>,
) -> Json<BatchReviewResponse> {
    let mut reviewed = Vec::new();
    let mut failed = Vec::new();
    for entry in request.reviews {
        match DiffStore::update_review(&*state.store, &entry.diff_id, entry.status, entry.reviewer).await {
            Ok(diff) => reviewed.push(diff),
            Err(e) => failed.push(BatchReviewFailure { diff_id: entry.diff_id, error: e.to_string() }),
        }
    }
    Json(BatchReviewResponse { reviewed, failed })
}

// ============================================================================
// Quality-check handlers
// ============================================================================

async fn dispatch_quality_check_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DatasetId>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let result = state.scheduler.dispatch_quality_check(id).await;
    super::middleware::record_quality_check_dispatch(&id.to_string(), result.is_ok());
    result.map_err(|e| match e {
        DispatchError::DatasetNotFound(id) => err(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", format!("dataset {id} is not registered")),
        DispatchError::NoBaseline(id) => err(StatusCode::BAD_REQUEST, "NO_BASELINE", format!("dataset {id} has no baseline yet")),
        DispatchError::AlreadyRunning(id) => err(StatusCode::BAD_REQUEST, "ALREADY_RUNNING", format!("quality check already running for dataset {id}")),
    })?;
    Ok(StatusCode::ACCEPTED)
}

async fn quality_check_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DatasetId>,
) -> Result<Json<QualityCheckStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = state
        .scheduler
        .status()
        .get(&id)
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "NO_STATUS", format!("no quality-check status recorded for dataset {id}")))?;
    Ok(Json(status.into()))
}

// ============================================================================
// Health probes
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let healthy = state.store.is_healthy().await;
    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        schema_version: GEOWATCH_SCHEMA_VERSION.to_string(),
        database_connected: healthy,
    })
}

async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive".to_string() })
}

async fn readiness_handler(State(state): State<Arc<AppState>>) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let healthy = state.store.is_healthy().await;
    if healthy {
        Ok(Json(ReadinessResponse { ready: true, database: true }))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(ReadinessResponse { ready: false, database: false })))
    }
}

// ============================================================================
// Router construction
// ============================================================================

/// Build the axum router for the control-surface API.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/datasets", post(register_dataset_handler).get(list_datasets_handler))
        .route("/api/datasets/:id", patch(update_dataset_handler).get(get_dataset_handler))
        .route("/api/datasets/:id/deactivate", post(deactivate_dataset_handler))
        .route("/api/datasets/:id/reset", post(reset_dataset_handler))
        .route("/api/datasets/:id/quality-check", post(dispatch_quality_check_handler))
        .route("/api/datasets/:id/quality-check/status", get(quality_check_status_handler))
        .route("/api/diffs", get(list_diffs_handler))
        .route("/api/diffs/:id", get(get_diff_handler))
        .route("/api/diffs/:id/review", post(review_diff_handler))
        .route("/api/diffs/review/batch", post(batch_review_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}
