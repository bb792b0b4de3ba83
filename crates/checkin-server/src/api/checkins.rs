//! Check-in API endpoints.
//!
//! The phone scans the event QR code, samples its own location and takes a
//! confirmation selfie, then submits all three here. The server decides
//! eligibility and keeps the check-in log.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use checkin_core::{
    CheckinKey, CheckinRecord, EligibilityVerdict, EventPayload, GeoPosition, ReportedSensors,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the check-ins router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_checkins).post(create_checkin))
        .route("/verify", post(verify_checkin))
        .route("/{key}", get(get_checkin))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for an eligibility preview.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "payload": "{\"type\":\"event\",\"v\":1,\"title\":\"Volunteer day\",\"date\":\"2025-03-14\",\"time\":\"10:00\",\"location\":\"Main square\",\"gps\":{\"lat\":21.0,\"lng\":105.0},\"expireAfterMinutes\":60}",
    "position": {"lat": 21.0001, "lng": 105.0001, "accuracyMeters": 12.0}
}))]
pub struct VerifyRequest {
    /// Raw text decoded from the QR code.
    pub payload: String,

    /// Device position, if the phone sampled one.
    pub position: Option<GeoPosition>,
}

/// Eligibility preview.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// The decoded event.
    pub payload: EventPayload,

    /// Deduplication key of the event.
    pub composite_key: CheckinKey,

    /// Whether this event is already in the log.
    #[schema(example = false)]
    pub already_checked_in: bool,

    /// Time-window and geofence verdict.
    pub verdict: EligibilityVerdict,
}

/// Request body for a check-in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "payload": "{\"type\":\"event\",\"v\":1,\"title\":\"Volunteer day\",\"date\":\"2025-03-14\",\"time\":\"10:00\",\"location\":\"Main square\"}",
    "position": {"lat": 21.0001, "lng": 105.0001, "accuracyMeters": 12.0},
    "selfieImage": "data:image/jpeg;base64,/9j/4AAQ..."
}))]
pub struct CheckinRequest {
    /// Raw text decoded from the QR code.
    pub payload: String,

    /// Device position. Required for events with a geofence.
    pub position: Option<GeoPosition>,

    /// Confirmation image captured by the phone. Required.
    pub selfie_image: Option<String>,
}

/// Check-in history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckinHistoryResponse {
    /// Every recorded check-in, oldest first.
    pub entries: Vec<CheckinRecord>,

    /// Number of check-ins.
    #[schema(example = 3)]
    pub total: usize,

    /// DRL points earned through check-ins.
    #[schema(example = 12)]
    pub total_points: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Preview eligibility for a scanned code.
#[utoipa::path(
    post,
    path = "/checkins/verify",
    tag = "checkins",
    operation_id = "verifyCheckin",
    summary = "Check eligibility without recording",
    description = "Decodes the scanned code and evaluates the time window and \
        geofence. Nothing is recorded.",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verdict computed", body = VerifyResponse),
        (status = 400, description = "Unsupported QR code", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn verify_checkin(
    State(state): State<SharedState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    let state_guard = state.read().await;

    let (payload, verdict) =
        state_guard
            .service
            .verify(&request.payload, request.position.as_ref(), Utc::now())?;
    let composite_key = CheckinKey::for_payload(&payload);
    let already_checked_in = match state_guard.service.find(&composite_key) {
        Ok(_) => true,
        Err(checkin_core::CheckinError::CheckinNotFound(_)) => false,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(VerifyResponse {
        payload,
        composite_key,
        already_checked_in,
        verdict,
    }))
}

/// Check in to an event.
#[utoipa::path(
    post,
    path = "/checkins",
    tag = "checkins",
    operation_id = "createCheckin",
    summary = "Check in to an event",
    description = "Validates the scanned code against its time window and \
        geofence and records the check-in once. A second check-in for the same \
        event (same title, date and time) is refused.",
    request_body = CheckinRequest,
    responses(
        (status = 201, description = "Check-in recorded", body = CheckinRecord),
        (status = 400, description = "Unsupported QR code", body = crate::api::error::ErrorResponse),
        (status = 403, description = "Outside the time window or geofence", body = crate::api::error::ErrorResponse),
        (status = 409, description = "Already checked in", body = crate::api::error::ErrorResponse),
        (status = 503, description = "Location or image missing", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn create_checkin(
    State(state): State<SharedState>,
    Json(request): Json<CheckinRequest>,
) -> ApiResult<(StatusCode, Json<CheckinRecord>)> {
    let sensors = ReportedSensors::new(request.position, request.selfie_image);

    let mut state_guard = state.write().await;
    let record = state_guard
        .service
        .check_in(&request.payload, &sensors, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// List recorded check-ins.
#[utoipa::path(
    get,
    path = "/checkins",
    tag = "checkins",
    operation_id = "listCheckins",
    summary = "List check-in history",
    responses(
        (status = 200, description = "History retrieved", body = CheckinHistoryResponse)
    )
)]
pub async fn list_checkins(
    State(state): State<SharedState>,
) -> ApiResult<Json<CheckinHistoryResponse>> {
    let state_guard = state.read().await;

    let entries = state_guard.service.history()?;
    let total_points = state_guard.service.total_points()?;

    Ok(Json(CheckinHistoryResponse {
        total: entries.len(),
        total_points,
        entries,
    }))
}

/// Get a single check-in by composite key.
#[utoipa::path(
    get,
    path = "/checkins/{key}",
    tag = "checkins",
    operation_id = "getCheckin",
    summary = "Get a check-in",
    params(
        ("key" = String, Path, description = "Composite key `title|date|time`, URL-encoded")
    ),
    responses(
        (status = 200, description = "Check-in found", body = CheckinRecord),
        (status = 404, description = "No check-in for this key", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_checkin(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> ApiResult<Json<CheckinRecord>> {
    if key.trim().is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "invalid_key".to_string(),
            message: "Check-in key must not be empty".to_string(),
        });
    }

    let state_guard = state.read().await;
    let record = state_guard.service.find(&CheckinKey::from_raw(key))?;
    Ok(Json(record))
}
