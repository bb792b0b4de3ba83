//! Configuration API endpoints.
//!
//! Exposes the effective check-in policy and lets a deployment tighten or
//! relax the geofence.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use checkin_core::{CheckinError, Config};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the config router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_config))
        .route("/geofence", put(update_geofence))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Current configuration response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "timezone": "Asia/Ho_Chi_Minh",
    "geofence": {
        "minRadiusMeters": 100.0,
        "accuracyMultiplier": 2.0
    },
    "gpsTimeoutSecs": 15,
    "cameraTimeoutSecs": 30
}))]
pub struct ConfigResponse {
    /// Timezone used to interpret event dates and times (IANA format).
    #[schema(example = "Asia/Ho_Chi_Minh")]
    pub timezone: String,

    /// Geofence sizing.
    pub geofence: GeofenceSettings,

    /// GPS acquisition timeout in seconds.
    #[schema(example = 15)]
    pub gps_timeout_secs: u64,

    /// Camera capture timeout in seconds.
    #[schema(example = 30)]
    pub camera_timeout_secs: u64,
}

/// Geofence sizing settings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceSettings {
    /// Floor for the fence radius, in meters.
    #[schema(example = 100.0)]
    pub min_radius_meters: f64,

    /// Factor applied to reported GPS accuracies.
    #[schema(example = 2.0)]
    pub accuracy_multiplier: f64,
}

/// Request to update the geofence.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "minRadiusMeters": 50.0
}))]
pub struct UpdateGeofenceRequest {
    /// New fence floor in meters. Must be positive.
    #[schema(example = 50.0)]
    pub min_radius_meters: f64,

    /// New accuracy multiplier (at least 1). Unchanged when omitted.
    #[schema(example = 2.0)]
    pub accuracy_multiplier: Option<f64>,
}

/// Response after updating the geofence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeofenceResponse {
    /// Whether the update was successful.
    pub success: bool,

    /// Updated settings.
    pub geofence: GeofenceSettings,
}

impl From<&Config> for GeofenceSettings {
    fn from(config: &Config) -> Self {
        Self {
            min_radius_meters: config.geofence.min_radius_meters,
            accuracy_multiplier: config.geofence.accuracy_multiplier,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Get current configuration.
#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Get current configuration",
    description = "Returns the check-in policy in effect: timezone, geofence \
        sizing and sensor timeouts.",
    responses(
        (status = 200, description = "Configuration retrieved", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> ApiResult<Json<ConfigResponse>> {
    let state_guard = state.read().await;
    let config = &state_guard.config;

    Ok(Json(ConfigResponse {
        timezone: config.system.timezone.clone(),
        geofence: GeofenceSettings::from(config),
        gps_timeout_secs: config.sensors.gps_timeout_secs,
        camera_timeout_secs: config.sensors.camera_timeout_secs,
    }))
}

/// Update geofence sizing.
#[utoipa::path(
    put,
    path = "/config/geofence",
    tag = "config",
    operation_id = "updateGeofence",
    summary = "Update geofence sizing",
    description = "Changes the minimum fence radius and, optionally, the \
        accuracy multiplier. The change is saved before it applies to \
        subsequent check-ins; if saving fails the previous sizing stays in effect.",
    request_body = UpdateGeofenceRequest,
    responses(
        (status = 200, description = "Geofence updated", body = UpdateGeofenceResponse),
        (status = 400, description = "Invalid value", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Configuration could not be saved", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn update_geofence(
    State(state): State<SharedState>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> ApiResult<Json<UpdateGeofenceResponse>> {
    if !request.min_radius_meters.is_finite() || request.min_radius_meters <= 0.0 {
        return Err(ApiError::BadRequest {
            error_code: "invalid_min_radius".to_string(),
            message: "Minimum radius must be a positive number of meters".to_string(),
        });
    }
    if let Some(multiplier) = request.accuracy_multiplier {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ApiError::BadRequest {
                error_code: "invalid_accuracy_multiplier".to_string(),
                message: "Accuracy multiplier must be at least 1".to_string(),
            });
        }
    }

    let mut state_guard = state.write().await;

    let mut updated = state_guard.config.clone();
    updated.geofence.min_radius_meters = request.min_radius_meters;
    if let Some(multiplier) = request.accuracy_multiplier {
        updated.geofence.accuracy_multiplier = multiplier;
    }

    state_guard
        .update_config(updated)
        .map_err(|e| ApiError::from(CheckinError::from(e)))?;

    let geofence = GeofenceSettings::from(&state_guard.config);
    tracing::info!(
        min_radius_meters = geofence.min_radius_meters,
        accuracy_multiplier = geofence.accuracy_multiplier,
        "Geofence updated"
    );

    Ok(Json(UpdateGeofenceResponse {
        success: true,
        geofence,
    }))
}
