//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer for business logic.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{info, warn};

use super::dto::{
    AggregateQuery, AggregateResponse, AircraftListResponse, CreateSnapshotRequest,
    DeltaListResponse, DeltaQuery, HealthResponse, ImportRequest, ImportResponse, SnapshotDto,
    SnapshotListResponse, SnapshotQuery, UpdateSnapshotRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{AircraftId, SnapshotId};
use crate::db::services as db_services;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Header carrying the submitting user.
pub const USER_HEADER: &str = "x-user-id";
const DEFAULT_USER: &str = "system";

fn submitting_user(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

/// Unwrap a JSON body, reporting malformed payloads as 400.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Unwrap a numeric snapshot id from the path, reporting bad ids as 400.
fn snapshot_id(path: Result<Path<i64>, PathRejection>) -> Result<SnapshotId, AppError> {
    path.map(|Path(id)| SnapshotId::new(id))
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn aircraft_path(raw: &str) -> Result<AircraftId, AppError> {
    AircraftId::parse(raw).ok_or_else(|| AppError::BadRequest("aircraftId must not be empty".into()))
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and storage is reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Snapshot CRUD
// =============================================================================

/// GET /v1/utilization
///
/// List snapshots, optionally filtered by aircraft and inclusive date range.
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> HandlerResult<SnapshotListResponse> {
    let filter = query.to_filter().map_err(AppError::BadRequest)?;
    let snapshots = db_services::list_snapshots(state.repository.as_ref(), &filter).await?;

    let snapshots: Vec<SnapshotDto> = snapshots.into_iter().map(Into::into).collect();
    let total = snapshots.len();
    Ok(Json(SnapshotListResponse { snapshots, total }))
}

/// POST /v1/utilization
///
/// Record one daily snapshot. 409 on duplicate day, 422 on counter regression.
pub async fn create_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateSnapshotRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SnapshotDto>), AppError> {
    let user = submitting_user(&headers);
    let new_snapshot = json_body(body)?
        .into_new_snapshot(&user)
        .map_err(AppError::BadRequest)?;

    let stored = db_services::create_snapshot(state.repository.as_ref(), new_snapshot).await?;
    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// GET /v1/utilization/{id}
pub async fn get_snapshot(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> HandlerResult<SnapshotDto> {
    let snapshot = db_services::get_snapshot(state.repository.as_ref(), snapshot_id(id)?).await?;
    Ok(Json(snapshot.into()))
}

/// PATCH /v1/utilization/{id}
///
/// Partial update; the merged snapshot is re-validated against its neighbours.
pub async fn update_snapshot(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    body: Result<Json<UpdateSnapshotRequest>, JsonRejection>,
) -> HandlerResult<SnapshotDto> {
    let user = submitting_user(&headers);
    let patch = json_body(body)?
        .into_patch()
        .map_err(AppError::BadRequest)?;

    let updated =
        db_services::update_snapshot(state.repository.as_ref(), snapshot_id(id)?, &patch, &user)
            .await?;
    Ok(Json(updated.into()))
}

/// DELETE /v1/utilization/{id}
///
/// Returns the deleted record.
pub async fn delete_snapshot(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
) -> HandlerResult<SnapshotDto> {
    let id = snapshot_id(id)?;
    let deleted = db_services::delete_snapshot(state.repository.as_ref(), id).await?;
    info!(
        snapshot_id = %id,
        user = %submitting_user(&headers),
        "snapshot deleted"
    );
    Ok(Json(deleted.into()))
}

// =============================================================================
// Batch import
// =============================================================================

/// POST /v1/utilization/import
///
/// Record many snapshots; each row is validated on its own and reported.
pub async fn import_snapshots(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> HandlerResult<ImportResponse> {
    let user = submitting_user(&headers);
    let rows = json_body(body)?
        .into_new_snapshots(&user)
        .map_err(AppError::BadRequest)?;

    let batch_id = uuid::Uuid::new_v4().to_string();
    info!(batch_id = %batch_id, rows = rows.len(), user = %user, "starting snapshot import");

    let report = db_services::import_snapshots(state.repository.as_ref(), rows).await?;
    if report.rejected > 0 {
        warn!(batch_id = %batch_id, rejected = report.rejected, "import finished with rejected rows");
    }

    Ok(Json(ImportResponse { batch_id, report }))
}

// =============================================================================
// Derived views
// =============================================================================

/// GET /v1/utilization/aggregate
///
/// Utilization grouped by `period` (day, month or year).
pub async fn aggregate_utilization(
    State(state): State<AppState>,
    Query(query): Query<AggregateQuery>,
) -> HandlerResult<AggregateResponse> {
    let period = query.period().map_err(AppError::BadRequest)?;
    let filter = query.filter.to_filter().map_err(AppError::BadRequest)?;

    let buckets =
        db_services::aggregate_utilization(state.repository.as_ref(), period, &filter).await?;
    Ok(Json(AggregateResponse { period, buckets }))
}

/// GET /v1/aircraft
pub async fn list_aircraft(State(state): State<AppState>) -> HandlerResult<AircraftListResponse> {
    let aircraft = db_services::list_aircraft(state.repository.as_ref()).await?;
    let total = aircraft.len();
    Ok(Json(AircraftListResponse { aircraft, total }))
}

/// GET /v1/aircraft/{aircraft_id}/utilization/latest
pub async fn latest_snapshot(
    State(state): State<AppState>,
    Path(aircraft_id): Path<String>,
) -> HandlerResult<SnapshotDto> {
    let aircraft_id = aircraft_path(&aircraft_id)?;
    let snapshot = db_services::latest_snapshot(state.repository.as_ref(), &aircraft_id).await?;
    Ok(Json(snapshot.into()))
}

/// GET /v1/aircraft/{aircraft_id}/utilization/deltas
///
/// Day-over-day deltas between consecutive snapshots inside the range.
pub async fn get_daily_deltas(
    State(state): State<AppState>,
    Path(aircraft_id): Path<String>,
    Query(query): Query<DeltaQuery>,
) -> HandlerResult<DeltaListResponse> {
    let aircraft_id = aircraft_path(&aircraft_id)?;
    let range = query.to_range().map_err(AppError::BadRequest)?;

    let deltas =
        db_services::get_daily_deltas(state.repository.as_ref(), &aircraft_id, range).await?;
    let total = deltas.len();
    Ok(Json(DeltaListResponse {
        aircraft_id,
        deltas,
        total,
    }))
}
