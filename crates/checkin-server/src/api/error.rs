//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use checkin_core::CheckinError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client (including unusable QR codes).
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403 Forbidden - The attempt is understood but not eligible.
    Forbidden {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Whether trying again (closer, later fix) may succeed.
        retryable: bool,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - The event has already been checked in.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Composite key of the existing check-in.
        composite_key: Option<String>,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (not exposed to client in production).
        details: Option<String>,
    },

    /// 503 Service Unavailable - A device sensor is unavailable.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 504 Gateway Timeout - A device sensor did not answer in time.
    GatewayTimeout {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "outside_geofence",
    "message": "You are 250 m from the event location; check-in is allowed within 100 m",
    "details": {"retryable": true}
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "duplicate_checkin").
    #[schema(example = "duplicate_checkin")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Already checked in to this event")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::BadRequest {
                error_code,
                message,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::Forbidden {
                error_code,
                message,
                retryable,
            } => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: Some(serde_json::json!({ "retryable": retryable })),
                },
            ),

            Self::NotFound {
                error_code,
                message,
            } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::Conflict {
                error_code,
                message,
                composite_key,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: Some(serde_json::json!({ "compositeKey": composite_key })),
                },
            ),

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                // Log internal errors
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: error_code,
                        message,
                        details: details.map(|d| serde_json::json!(d)),
                    },
                )
            }

            Self::ServiceUnavailable {
                error_code,
                message,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),

            Self::GatewayTimeout {
                error_code,
                message,
            } => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
            Self::GatewayTimeout { message, .. } => write!(f, "Gateway Timeout: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from checkin_core errors.
///
/// The status comes from [`CheckinError::http_status_code`], so the core and
/// the HTTP layer cannot disagree.
impl From<CheckinError> for ApiError {
    fn from(err: CheckinError) -> Self {
        let error_code = err.error_code().to_lowercase();
        let message = err.to_string();

        match err.http_status_code() {
            400 => Self::BadRequest {
                error_code,
                message,
            },
            403 => Self::Forbidden {
                error_code,
                message,
                retryable: err.is_user_retryable(),
            },
            404 => Self::NotFound {
                error_code,
                message,
            },
            409 => Self::Conflict {
                error_code,
                message,
                composite_key: match &err {
                    CheckinError::DuplicateCheckin(key) => Some(key.to_string()),
                    _ => None,
                },
            },
            503 => Self::ServiceUnavailable {
                error_code,
                message,
            },
            504 => Self::GatewayTimeout {
                error_code,
                message,
            },
            _ => Self::InternalError {
                error_code,
                message: "The check-in service failed unexpectedly".to_string(),
                details: Some(message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_core::CheckinKey;

    #[test]
    fn test_bad_request_error() {
        let err = ApiError::BadRequest {
            error_code: "test_error".to_string(),
            message: "Test message".to_string(),
        };
        assert!(err.to_string().contains("Bad Request"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "test_error".to_string(),
            message: "Test message".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test_error"));
    }

    #[test]
    fn test_status_matches_core_mapping() {
        let cases = [
            CheckinError::MalformedPayload("x".into()),
            CheckinError::TimeWindowClosed { minutes_ago: 2 },
            CheckinError::DuplicateCheckin(CheckinKey::from_raw("a|b|c")),
            CheckinError::CheckinNotFound(CheckinKey::from_raw("a|b|c")),
            CheckinError::SensorUnavailable("camera".into()),
            CheckinError::SensorTimeout("GPS".into()),
            CheckinError::PersistenceError("disk".into()),
            CheckinError::Config(checkin_core::ConfigError::NotFound("/x".into())),
        ];
        for err in cases {
            let expected = err.http_status_code();
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
    }

    #[test]
    fn test_duplicate_carries_key() {
        let err = ApiError::from(CheckinError::DuplicateCheckin(CheckinKey::from_raw(
            "Talk|2025-01-01|09:00",
        )));
        match err {
            ApiError::Conflict {
                error_code,
                composite_key,
                ..
            } => {
                assert_eq!(error_code, "duplicate_checkin");
                assert_eq!(composite_key.as_deref(), Some("Talk|2025-01-01|09:00"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_conflict_details_use_camel_case() {
        let response = ApiError::from(CheckinError::DuplicateCheckin(CheckinKey::from_raw(
            "Talk|2025-01-01|09:00",
        )))
        .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["details"]["compositeKey"], "Talk|2025-01-01|09:00");
    }
}
