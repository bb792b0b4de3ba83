//! OpenAPI specification generation for the check-in API.
//!
//! The generated document is served at `/api/openapi.json` and written to the
//! workspace root by the `gen-openapi` binary for client generation.

use axum::Json;
use checkin_core::{
    CheckinKey, CheckinRecord, EligibilityVerdict, EventGps, EventPayload, GeoPosition,
    GeofenceCheck, PayloadKind, Rejection, TimeWindowCheck,
};
use utoipa::OpenApi;

use super::checkins::{CheckinHistoryResponse, CheckinRequest, VerifyRequest, VerifyResponse};
use super::config::{
    ConfigResponse, GeofenceSettings, UpdateGeofenceRequest, UpdateGeofenceResponse,
};
use super::error::ErrorResponse;
use super::health::{HealthResponse, HealthStatus};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> serde_json::Result<String> {
    ApiDoc::openapi().to_pretty_json()
}

/// OpenAPI document for the check-in server.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "checkin API",
        version = "0.1.0",
        description = r#"
# checkin API

Event attendance through QR codes.

## Overview

Organizers publish a QR code per event. A student's phone scans it, samples
its location and captures a confirmation selfie, then submits the attempt.
The server decides whether the check-in is allowed:

1. **Time window**: the code expires a configured number of minutes after the event starts.
2. **Geofence**: events with coordinates only accept attempts from within an
   accuracy-adjusted radius (never smaller than the configured floor).
3. **Once per event**: a title, date and time combination is recorded at most once.

Accepted check-ins are kept in a local log together with their DRL points.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local check-in server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "checkins", description = "Eligibility checks and the check-in log"),
        (name = "config", description = "Time zone, geofence and sensor settings")
    ),
    paths(
        super::health::health_check,
        super::checkins::verify_checkin,
        super::checkins::create_checkin,
        super::checkins::list_checkins,
        super::checkins::get_checkin,
        super::config::get_config,
        super::config::update_geofence,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            HealthStatus,
            // Check-in types
            VerifyRequest,
            VerifyResponse,
            CheckinRequest,
            CheckinHistoryResponse,
            CheckinRecord,
            CheckinKey,
            EventPayload,
            EventGps,
            PayloadKind,
            GeoPosition,
            EligibilityVerdict,
            Rejection,
            TimeWindowCheck,
            GeofenceCheck,
            // Config types
            ConfigResponse,
            GeofenceSettings,
            UpdateGeofenceRequest,
            UpdateGeofenceResponse,
        )
    )
)]
pub struct ApiDoc;
