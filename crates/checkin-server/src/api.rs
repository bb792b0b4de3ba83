//! HTTP API routes and handlers.
//!
//! Endpoints are organized by domain:
//! - `checkins` - Eligibility preview, check-in and history
//! - `config` - Check-in policy settings
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;

use crate::state::SharedState;

pub mod checkins;
pub mod config;
pub mod error;
pub mod health;
pub mod openapi;

pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /checkins          - History (GET) and check-in (POST)
/// │   ├── /verify        - Eligibility preview
/// │   └── /{key}         - Single check-in by composite key
/// ├── /config            - Policy settings
/// │   └── /geofence      - Geofence sizing
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                // OpenAPI spec at /api/openapi.json
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/checkins", checkins::router())
                .nest("/config", config::router()),
        )
        .with_state(state)
}
