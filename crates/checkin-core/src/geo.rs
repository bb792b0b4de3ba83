//! Great-circle distance and geofence checks.
//!
//! The allowed radius grows with the reported GPS accuracy of either side so
//! that a noisy fix does not lock a student out of an event they attend:
//!
//! ```text
//! allowed = max(min_radius, k * device_accuracy, k * event_accuracy)
//! ```
//!
//! With the defaults (`min_radius = 100 m`, `k = 2`) an indoor fix reporting
//! 80 m of accuracy gets a 160 m fence.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::GeofenceConfig;
use crate::payload::EventGps;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Smallest fence radius applied when no configuration overrides it.
pub const DEFAULT_MIN_RADIUS_METERS: f64 = 100.0;

/// Default factor applied to reported accuracies.
pub const DEFAULT_ACCURACY_MULTIPLIER: f64 = 2.0;

/// A device location fix sampled for one check-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"lat": 21.0286, "lng": 105.8541, "accuracyMeters": 18.5}))]
pub struct GeoPosition {
    /// Latitude in decimal degrees.
    pub lat: f64,

    /// Longitude in decimal degrees.
    pub lng: f64,

    /// Radius of the 68% confidence circle reported by the device, in meters.
    pub accuracy_meters: f64,
}

impl GeoPosition {
    /// Whether the coordinates are finite and within the valid ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine distance between two `(lat, lng)` pairs, in meters.
#[must_use]
pub fn haversine_distance_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = lng2 - lng1;

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Result of a geofence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceCheck {
    /// Whether the device is inside the fence (boundary inclusive).
    pub within_radius: bool,

    /// Distance between the device and the event anchor, in meters.
    #[schema(example = 42.7)]
    pub distance_meters: f64,

    /// Effective fence radius used for the decision, in meters.
    #[schema(example = 100.0)]
    pub allowed_radius_meters: f64,
}

/// Fence sizing rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofencePolicy {
    /// Floor for the fence radius, in meters.
    pub min_radius_meters: f64,

    /// Factor applied to each reported accuracy.
    pub accuracy_multiplier: f64,
}

impl Default for GeofencePolicy {
    fn default() -> Self {
        Self {
            min_radius_meters: DEFAULT_MIN_RADIUS_METERS,
            accuracy_multiplier: DEFAULT_ACCURACY_MULTIPLIER,
        }
    }
}

impl From<&GeofenceConfig> for GeofencePolicy {
    fn from(config: &GeofenceConfig) -> Self {
        Self {
            min_radius_meters: config.min_radius_meters,
            accuracy_multiplier: config.accuracy_multiplier,
        }
    }
}

impl GeofencePolicy {
    /// Effective radius for the given accuracies.
    ///
    /// Missing, negative or non-finite accuracies count as zero.
    #[must_use]
    pub fn allowed_radius(&self, device_accuracy: Option<f64>, event_accuracy: Option<f64>) -> f64 {
        let scaled = |acc: Option<f64>| {
            acc.filter(|a| a.is_finite() && *a > 0.0)
                .map_or(0.0, |a| a * self.accuracy_multiplier)
        };
        self.min_radius_meters
            .max(scaled(device_accuracy))
            .max(scaled(event_accuracy))
    }

    /// Checks `device` against the event anchor.
    #[must_use]
    pub fn check(&self, anchor: &EventGps, device: &GeoPosition) -> GeofenceCheck {
        let distance_meters =
            haversine_distance_meters((anchor.lat, anchor.lng), (device.lat, device.lng));
        let allowed_radius_meters =
            self.allowed_radius(Some(device.accuracy_meters), anchor.accuracy_meters);

        GeofenceCheck {
            within_radius: distance_meters <= allowed_radius_meters,
            distance_meters,
            allowed_radius_meters,
        }
    }
}
