//! Device sensor access (GPS and camera).
//!
//! Both sensors are suspending operations that may fail or hang. Callers go
//! through [`acquire_position`] and [`capture_image`], which bound each call
//! with an explicit timeout. Nothing is retried; the user re-triggers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::geo::GeoPosition;

/// Default GPS acquisition timeout.
pub const DEFAULT_GPS_TIMEOUT: Duration = Duration::from_secs(15);

/// Which sensor an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Location provider.
    Gps,
    /// Front camera used for the confirmation selfie.
    Camera,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gps => f.write_str("GPS"),
            Self::Camera => f.write_str("camera"),
        }
    }
}

/// Sensor failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The user or the OS refused access.
    #[error("{sensor} permission denied")]
    PermissionDenied {
        /// Sensor that was refused.
        sensor: SensorKind,
    },

    /// The sensor did not answer in time.
    #[error("{sensor} did not respond within {timeout_secs} seconds")]
    Timeout {
        /// Sensor that timed out.
        sensor: SensorKind,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// Hardware missing, or the sensor returned nothing usable.
    #[error("{sensor} unavailable: {message}")]
    Unavailable {
        /// Sensor that failed.
        sensor: SensorKind,
        /// Failure detail.
        message: String,
    },
}

impl SensorError {
    /// Sensor the error refers to.
    #[must_use]
    pub const fn sensor(&self) -> SensorKind {
        match self {
            Self::PermissionDenied { sensor }
            | Self::Timeout { sensor, .. }
            | Self::Unavailable { sensor, .. } => *sensor,
        }
    }
}

/// Access to the location provider and camera of the scanning device.
#[async_trait]
pub trait DeviceSensors: Send + Sync {
    /// Samples the current location once.
    async fn current_position(&self) -> Result<GeoPosition, SensorError>;

    /// Captures a confirmation image, returned as an encoded string
    /// (typically a `data:image/jpeg;base64,...` URL).
    async fn capture_image(&self) -> Result<String, SensorError>;
}

/// Samples the device location, giving up after `timeout`.
///
/// # Errors
///
/// Propagates the sensor's own error, returns [`SensorError::Timeout`] when
/// the deadline passes, and [`SensorError::Unavailable`] for a fix with
/// out-of-range coordinates.
pub async fn acquire_position<S>(sensors: &S, timeout: Duration) -> Result<GeoPosition, SensorError>
where
    S: DeviceSensors + ?Sized,
{
    let position = match tokio::time::timeout(timeout, sensors.current_position()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "GPS acquisition timed out");
            return Err(SensorError::Timeout {
                sensor: SensorKind::Gps,
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    if !position.is_valid() {
        return Err(SensorError::Unavailable {
            sensor: SensorKind::Gps,
            message: format!("invalid fix ({}, {})", position.lat, position.lng),
        });
    }

    debug!(
        lat = position.lat,
        lng = position.lng,
        accuracy_meters = position.accuracy_meters,
        "Acquired device position"
    );
    Ok(position)
}

/// Captures the confirmation image, giving up after `timeout`.
///
/// # Errors
///
/// Propagates the sensor's own error, returns [`SensorError::Timeout`] when
/// the deadline passes, and [`SensorError::Unavailable`] for an empty image.
pub async fn capture_image<S>(sensors: &S, timeout: Duration) -> Result<String, SensorError>
where
    S: DeviceSensors + ?Sized,
{
    let image = match tokio::time::timeout(timeout, sensors.capture_image()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Camera capture timed out");
            return Err(SensorError::Timeout {
                sensor: SensorKind::Camera,
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    if image.trim().is_empty() {
        return Err(SensorError::Unavailable {
            sensor: SensorKind::Camera,
            message: "no image captured".to_string(),
        });
    }
    Ok(image)
}

/// Sensor readings the device already sampled and sent along with the scan.
#[derive(Debug, Clone, Default)]
pub struct ReportedSensors {
    position: Option<GeoPosition>,
    image: Option<String>,
}

impl ReportedSensors {
    /// Wraps the readings a client submitted.
    #[must_use]
    pub const fn new(position: Option<GeoPosition>, image: Option<String>) -> Self {
        Self { position, image }
    }
}

#[async_trait]
impl DeviceSensors for ReportedSensors {
    async fn current_position(&self) -> Result<GeoPosition, SensorError> {
        self.position.ok_or_else(|| SensorError::Unavailable {
            sensor: SensorKind::Gps,
            message: "no location reported by the device".to_string(),
        })
    }

    async fn capture_image(&self) -> Result<String, SensorError> {
        self.image.clone().ok_or_else(|| SensorError::Unavailable {
            sensor: SensorKind::Camera,
            message: "no confirmation image reported by the device".to_string(),
        })
    }
}
