//! Eligibility decision for a check-in attempt.
//!
//! Both validators must pass (or be skipped). When several fail, the
//! time-window failure is the one reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CheckinError;
use crate::geo::{GeoPosition, GeofenceCheck, GeofencePolicy};
use crate::payload::EventPayload;
use crate::window::{check_time_window, TimeWindowCheck};

/// Why an attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// The TTL elapsed.
    #[serde(rename_all = "camelCase")]
    TimeWindowClosed {
        /// Whole minutes since closing, rounded up.
        minutes_ago: i64,
    },
    /// The device is outside the fence.
    #[serde(rename_all = "camelCase")]
    OutsideGeofence {
        /// Measured distance in meters.
        distance_meters: f64,
        /// Effective fence radius in meters.
        allowed_radius_meters: f64,
    },
    /// The event has a fence but no device position was available.
    LocationUnavailable,
}

impl From<Rejection> for CheckinError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::TimeWindowClosed { minutes_ago } => Self::TimeWindowClosed { minutes_ago },
            Rejection::OutsideGeofence {
                distance_meters,
                allowed_radius_meters,
            } => Self::OutsideGeofence {
                distance_meters,
                allowed_radius_meters,
            },
            Rejection::LocationUnavailable => {
                Self::SensorUnavailable("device location is required for this event".to_string())
            }
        }
    }
}

/// Combined verdict of the time-window and geofence validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityVerdict {
    /// Whether the attempt may proceed.
    pub eligible: bool,

    /// Human-readable reason when not eligible.
    #[schema(example = "Check-in for this event closed 4 minute(s) ago")]
    pub reason: Option<String>,

    /// Structured rejection when not eligible.
    pub rejection: Option<Rejection>,

    /// Event start resolved in the configured timezone.
    pub starts_at: DateTime<Utc>,

    /// Time-window result.
    pub time_window: TimeWindowCheck,

    /// Whether the event carries a geofence.
    pub geofence_required: bool,

    /// Geofence result; `None` when skipped or no position was available.
    pub geofence: Option<GeofenceCheck>,
}

impl EligibilityVerdict {
    /// Converts a refusal into the matching [`CheckinError`].
    ///
    /// # Errors
    ///
    /// Returns the error for [`Self::rejection`] when not eligible.
    pub fn into_result(self) -> Result<Self, CheckinError> {
        match self.rejection {
            Some(rejection) => Err(rejection.into()),
            None => Ok(self),
        }
    }
}

/// Evaluates an attempt for `payload` at `now`.
///
/// `device` is the sampled position, if any. A payload without GPS skips the
/// geofence; a payload with GPS and no usable device position (absent, or
/// coordinates out of range) is refused.
#[must_use]
pub fn evaluate(
    payload: &EventPayload,
    starts_at: DateTime<Utc>,
    device: Option<&GeoPosition>,
    policy: &GeofencePolicy,
    now: DateTime<Utc>,
) -> EligibilityVerdict {
    let time_window = check_time_window(starts_at, payload.expire_after_minutes, now);

    let geofence_required = payload.gps.is_some();
    let geofence = payload
        .gps
        .as_ref()
        .zip(device.filter(|d| d.is_valid()))
        .map(|(anchor, device)| policy.check(anchor, device));

    let rejection = if time_window.within_window {
        match (geofence_required, geofence) {
            (false, _) => None,
            (true, None) => Some(Rejection::LocationUnavailable),
            (true, Some(check)) if check.within_radius => None,
            (true, Some(check)) => Some(Rejection::OutsideGeofence {
                distance_meters: check.distance_meters,
                allowed_radius_meters: check.allowed_radius_meters,
            }),
        }
    } else {
        let overdue_secs = time_window
            .expires_at
            .map_or(0, |expires_at| (now - expires_at).num_seconds());
        Some(Rejection::TimeWindowClosed {
            minutes_ago: (overdue_secs + 59) / 60,
        })
    };

    EligibilityVerdict {
        eligible: rejection.is_none(),
        reason: rejection.map(|r| CheckinError::from(r).to_string()),
        rejection,
        starts_at,
        time_window,
        geofence_required,
        geofence,
    }
}
