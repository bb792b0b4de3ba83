//! Check-in records and their deduplication key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::GeoPosition;
use crate::payload::EventPayload;

/// Deduplication key of a check-in: `title|date|time`.
///
/// Events carry no stable identifier, so the key is derived from the display
/// fields printed on the code. Two codes for the same title, date and start
/// time are the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "Blood donation day|2025-03-14|10:00")]
pub struct CheckinKey(String);

impl CheckinKey {
    /// Separator between the key components.
    pub const SEPARATOR: char = '|';

    /// Builds the key for a decoded payload.
    #[must_use]
    pub fn for_payload(payload: &EventPayload) -> Self {
        Self(format!(
            "{}{sep}{}{sep}{}",
            payload.title,
            payload.date.format("%Y-%m-%d"),
            payload.time.format("%H:%M"),
            sep = Self::SEPARATOR,
        ))
    }

    /// Wraps an already-formed key, e.g. one taken from a request path.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    /// Record identifier (UUID v7, time ordered).
    pub id: Uuid,

    /// Deduplication key derived from the payload.
    pub composite_key: CheckinKey,

    /// When the check-in was accepted (UTC).
    pub timestamp: DateTime<Utc>,

    /// The decoded payload that was scanned.
    pub payload: EventPayload,

    /// Device position used for the geofence check, if one was needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_position: Option<GeoPosition>,

    /// Distance to the event anchor, if a geofence check ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 37.2)]
    pub distance_meters: Option<f64>,

    /// Confirmation image captured at check-in.
    #[schema(example = "data:image/jpeg;base64,/9j/4AAQ...")]
    pub selfie_image: String,
}

impl CheckinRecord {
    /// Creates a record for `payload` accepted at `timestamp`.
    #[must_use]
    pub fn new(
        payload: EventPayload,
        timestamp: DateTime<Utc>,
        user_position: Option<GeoPosition>,
        distance_meters: Option<f64>,
        selfie_image: String,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            composite_key: CheckinKey::for_payload(&payload),
            timestamp,
            payload,
            user_position,
            distance_meters,
            selfie_image,
        }
    }
}
