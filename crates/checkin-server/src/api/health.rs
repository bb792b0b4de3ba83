//! Liveness and storage readiness.
//!
//! `GET /health` reads the check-in log. A log that cannot be read means every
//! check-in would fail, so the endpoint reports `degraded` with a 503.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The check-in log is readable.
    Ok,
    /// The check-in log cannot be read.
    Degraded,
}

/// Health report.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "timezone": "Asia/Ho_Chi_Minh",
    "checkins": 4
}))]
pub struct HealthResponse {
    pub status: HealthStatus,

    /// Crate version.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Timezone event codes are read in.
    #[schema(example = "Asia/Ho_Chi_Minh")]
    pub timezone: String,

    /// Entries in the check-in log; absent when it cannot be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 4)]
    pub checkins: Option<usize>,

    /// Why the service is degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Reports whether check-ins can be served.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Reads the check-in log and reports its size. Responds 503 \
        when the log is unreadable, since no check-in could be recorded.",
    responses(
        (status = 200, description = "Check-ins can be served", body = HealthResponse),
        (status = 503, description = "The check-in log is unreadable", body = HealthResponse)
    )
)]
pub async fn health_check(
    State(state): State<SharedState>,
) -> (StatusCode, Json<HealthResponse>) {
    let state_guard = state.read().await;

    let (status, checkins, problem) = match state_guard.service.history() {
        Ok(entries) => (HealthStatus::Ok, Some(entries.len()), None),
        Err(e) => {
            tracing::warn!(error = %e, "Check-in log unreadable");
            (HealthStatus::Degraded, None, Some(e.to_string()))
        }
    };

    let code = match status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timezone: state_guard.config.system.timezone.clone(),
            checkins,
            problem,
        }),
    )
}
