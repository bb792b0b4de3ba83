//! Unified error types for the check-in core library.
//!
//! [`CheckinError`] covers every failure mode of a check-in attempt. Modules
//! keep their own narrower errors ([`PayloadError`], [`SensorError`],
//! [`ConfigError`]) which convert into it.
//!
//! None of these errors is fatal. Each is shown to the user as a short notice
//! and the user is returned to a state where they can scan again.
//!
//! # Example
//!
//! ```rust
//! use checkin_core::error::{CheckinError, Result};
//!
//! fn require_image(image: Option<&str>) -> Result<&str> {
//!     image.ok_or(CheckinError::SensorUnavailable("no image captured".into()))
//! }
//! ```
//!
//! [`PayloadError`]: crate::payload::PayloadError
//! [`SensorError`]: crate::sensors::SensorError
//! [`ConfigError`]: crate::config::ConfigError

use thiserror::Error;

use crate::config::ConfigError;
use crate::record::CheckinKey;

/// The unified error type for all check-in operations.
#[derive(Debug, Error)]
pub enum CheckinError {
    // =========================================================================
    // PAYLOAD ERRORS
    // =========================================================================
    /// The scanned code is not a well-formed check-in payload.
    #[error("Unsupported QR code: {0}")]
    MalformedPayload(String),

    /// The scanned code is well-formed JSON but not an event code.
    #[error("Unsupported QR code type '{0}'")]
    UnsupportedPayload(String),

    /// The event start cannot be placed on the timeline (DST gap).
    #[error("Event start {0} does not exist in the configured timezone")]
    NonexistentStartTime(String),

    // =========================================================================
    // ELIGIBILITY ERRORS
    // =========================================================================
    /// The check-in window has closed.
    #[error("Check-in for this event closed {minutes_ago} minute(s) ago")]
    TimeWindowClosed {
        /// Whole minutes since the window closed.
        minutes_ago: i64,
    },

    /// The device is too far from the event location.
    #[error(
        "You are {distance_meters:.0} m from the event location; check-in is allowed within {allowed_radius_meters:.0} m"
    )]
    OutsideGeofence {
        /// Measured distance in meters.
        distance_meters: f64,
        /// Effective fence radius in meters.
        allowed_radius_meters: f64,
    },

    /// A check-in for this event already exists.
    #[error("Already checked in to this event ({0})")]
    DuplicateCheckin(CheckinKey),

    /// No check-in exists for the key.
    #[error("No check-in found for '{0}'")]
    CheckinNotFound(CheckinKey),

    // =========================================================================
    // SENSOR ERRORS
    // =========================================================================
    /// Access to GPS or camera was refused.
    #[error("Permission denied: {0}")]
    SensorPermissionDenied(String),

    /// GPS or camera did not answer in time.
    #[error("Sensor timed out: {0}. Please try again.")]
    SensorTimeout(String),

    /// GPS or camera is unavailable or produced nothing usable.
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration could not be loaded, validated or saved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading the check-in log.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for check-in operations.
pub type Result<T> = std::result::Result<T, CheckinError>;

impl CheckinError {
    /// Returns `true` if the scanned code itself is the problem.
    #[inline]
    #[must_use]
    pub const fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload(_) | Self::UnsupportedPayload(_) | Self::NonexistentStartTime(_)
        )
    }

    /// Returns `true` if the code was valid but the attempt is not eligible.
    #[inline]
    #[must_use]
    pub const fn is_eligibility_error(&self) -> bool {
        matches!(
            self,
            Self::TimeWindowClosed { .. } | Self::OutsideGeofence { .. } | Self::DuplicateCheckin(_)
        )
    }

    /// Returns `true` if GPS or camera access failed.
    #[inline]
    #[must_use]
    pub const fn is_sensor_error(&self) -> bool {
        matches!(
            self,
            Self::SensorPermissionDenied(_) | Self::SensorTimeout(_) | Self::SensorUnavailable(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if simply trying again (moving closer, re-granting a
    /// permission, waiting for a fix) may succeed.
    #[inline]
    #[must_use]
    pub const fn is_user_retryable(&self) -> bool {
        matches!(
            self,
            Self::OutsideGeofence { .. }
                | Self::SensorPermissionDenied(_)
                | Self::SensorTimeout(_)
                | Self::SensorUnavailable(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - unusable code
            Self::MalformedPayload(_)
            | Self::UnsupportedPayload(_)
            | Self::NonexistentStartTime(_) => 400,

            // 403 Forbidden - understood but refused
            Self::TimeWindowClosed { .. }
            | Self::OutsideGeofence { .. }
            | Self::SensorPermissionDenied(_) => 403,

            // 404 Not Found
            Self::CheckinNotFound(_) => 404,

            // 409 Conflict - already recorded
            Self::DuplicateCheckin(_) => 409,

            // 500 Internal Server Error - server-side issues
            Self::Config(_) | Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 503 Service Unavailable - sensor hardware issues
            Self::SensorUnavailable(_) => 503,

            // 504 Gateway Timeout - sensor did not answer
            Self::SensorTimeout(_) => 504,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::UnsupportedPayload(_) => "UNSUPPORTED_PAYLOAD",
            Self::NonexistentStartTime(_) => "NONEXISTENT_START_TIME",
            Self::TimeWindowClosed { .. } => "TIME_WINDOW_CLOSED",
            Self::OutsideGeofence { .. } => "OUTSIDE_GEOFENCE",
            Self::DuplicateCheckin(_) => "DUPLICATE_CHECKIN",
            Self::CheckinNotFound(_) => "CHECKIN_NOT_FOUND",
            Self::SensorPermissionDenied(_) => "SENSOR_PERMISSION_DENIED",
            Self::SensorTimeout(_) => "SENSOR_TIMEOUT",
            Self::SensorUnavailable(_) => "SENSOR_UNAVAILABLE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::payload::PayloadError> for CheckinError {
    fn from(err: crate::payload::PayloadError) -> Self {
        use crate::payload::PayloadError;
        match err {
            PayloadError::UnsupportedType(kind) => Self::UnsupportedPayload(kind),
            other => Self::MalformedPayload(other.to_string()),
        }
    }
}

impl From<crate::sensors::SensorError> for CheckinError {
    fn from(err: crate::sensors::SensorError) -> Self {
        use crate::sensors::SensorError;
        match err {
            SensorError::PermissionDenied { .. } => Self::SensorPermissionDenied(err.to_string()),
            SensorError::Timeout { .. } => Self::SensorTimeout(err.to_string()),
            SensorError::Unavailable { .. } => Self::SensorUnavailable(err.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
