//! Event QR payload decoding.
//!
//! A check-in QR code carries a small JSON document describing the event:
//!
//! ```json
//! {
//!   "type": "event",
//!   "v": 1,
//!   "title": "Blood donation day",
//!   "date": "2025-03-14",
//!   "time": "10:00",
//!   "location": "Hall A2",
//!   "points": "5",
//!   "gps": { "lat": 21.0, "lng": 105.0, "accuracyMeters": 12 },
//!   "expireAfterMinutes": 60
//! }
//! ```
//!
//! [`decode_payload`] turns the scanned text into an immutable [`EventPayload`]
//! or rejects it with a [`PayloadError`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Payload `type` accepted by the decoder.
pub const EVENT_PAYLOAD_TYPE: &str = "event";

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

/// Errors produced while decoding a scanned payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The scanned text is not a JSON object.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    /// The payload is JSON but not an event payload.
    #[error("unsupported payload type: '{0}'")]
    UnsupportedType(String),

    /// A required field is absent or empty.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but its value is unusable.
    #[error("invalid field '{field}': {message}")]
    InvalidField {
        /// Field name as it appears in the payload.
        field: &'static str,
        /// What is wrong with the value.
        message: String,
    },
}

/// Payload kind tag. Only event payloads exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// An event check-in code.
    Event,
}

/// Anchor coordinates of an event, as embedded in the QR code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventGps {
    /// Latitude in decimal degrees.
    #[schema(example = 21.0285)]
    pub lat: f64,

    /// Longitude in decimal degrees.
    #[schema(example = 105.8542)]
    pub lng: f64,

    /// Reported accuracy of the anchor fix, in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 15.0)]
    pub accuracy_meters: Option<f64>,
}

/// A decoded event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Always [`PayloadKind::Event`].
    #[serde(rename = "type")]
    pub kind: PayloadKind,

    /// Payload format version.
    #[schema(example = 1)]
    pub v: u32,

    /// Event title.
    #[schema(example = "Blood donation day")]
    pub title: String,

    /// Event date (local calendar date).
    #[schema(value_type = String, example = "2025-03-14")]
    pub date: NaiveDate,

    /// Event start time (local wall clock, `HH:mm`).
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "10:00")]
    pub time: NaiveTime,

    /// Human-readable venue.
    #[schema(example = "Hall A2")]
    pub location: String,

    /// DRL points awarded for attending, as printed on the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "5")]
    pub points: Option<String>,

    /// Anchor location; when absent the geofence check is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<EventGps>,

    /// Minutes after the start during which check-in stays open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 60)]
    pub expire_after_minutes: Option<u32>,
}

impl EventPayload {
    /// Local start of the event as a naive wall-clock value.
    #[must_use]
    pub fn local_start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Resolves the event start in `tz` to an absolute instant.
    ///
    /// Ambiguous wall-clock times (DST fold) resolve to the earlier instant.
    /// Returns `None` when the local time does not exist (DST gap).
    #[must_use]
    pub fn starts_at(&self, tz: Tz) -> Option<DateTime<Utc>> {
        tz.from_local_datetime(&self.local_start())
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Parses `points` as a whole number of DRL points, if it is one.
    #[must_use]
    pub fn points_value(&self) -> Option<u32> {
        self.points.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

// Wire shape before validation. Everything optional so that each problem gets
// its own error instead of a serde message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    v: Option<serde_json::Number>,
    title: Option<String>,
    date: Option<String>,
    time: Option<String>,
    location: Option<String>,
    points: Option<RawPoints>,
    gps: Option<RawGps>,
    expire_after_minutes: Option<serde_json::Number>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPoints {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGps {
    lat: Option<f64>,
    lng: Option<f64>,
    accuracy_meters: Option<f64>,
}

/// Decodes a scanned QR string into an [`EventPayload`].
///
/// # Errors
///
/// Returns a [`PayloadError`] describing the first problem found.
pub fn decode_payload(raw: &str) -> Result<EventPayload, PayloadError> {
    let raw: RawPayload = serde_json::from_str(raw.trim())
        .map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

    match raw.kind.as_deref() {
        Some(EVENT_PAYLOAD_TYPE) => {}
        Some(other) => return Err(PayloadError::UnsupportedType(other.to_string())),
        None => return Err(PayloadError::MissingField("type")),
    }

    let v = raw.v.ok_or(PayloadError::MissingField("v"))?;
    let v = whole_number(&v)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|v| *v >= 1)
        .ok_or_else(|| PayloadError::InvalidField {
            field: "v",
            message: format!("version must be a positive integer, got {v}"),
        })?;

    let title = required_text(raw.title, "title")?;
    let location = required_text(raw.location, "location")?;
    let date = parse_date(&required_text(raw.date, "date")?)?;
    let time = parse_time(&required_text(raw.time, "time")?)?;

    let points = raw
        .points
        .map(|p| match p {
            RawPoints::Text(s) => s.trim().to_string(),
            RawPoints::Number(n) => n.to_string(),
        })
        .filter(|p| !p.is_empty());

    let gps = raw.gps.map(validate_gps).transpose()?;

    let expire_after_minutes = raw
        .expire_after_minutes
        .map(|m| {
            whole_number(&m)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| PayloadError::InvalidField {
                    field: "expireAfterMinutes",
                    message: format!("must be a whole, non-negative number of minutes, got {m}"),
                })
        })
        .transpose()?;

    Ok(EventPayload {
        kind: PayloadKind::Event,
        v,
        title,
        date,
        time,
        location,
        points,
        gps,
        expire_after_minutes,
    })
}

/// Integral value of a JSON number; `60` and `60.0` are the same value.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn whole_number(n: &serde_json::Number) -> Option<i64> {
    // Largest integer an f64 holds exactly.
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.trunc() == *f && f.abs() <= MAX_EXACT)
            .map(|f| f as i64)
    })
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, PayloadError> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(PayloadError::MissingField(field))
}

fn parse_date(s: &str) -> Result<NaiveDate, PayloadError> {
    let invalid = || PayloadError::InvalidField {
        field: "date",
        message: format!("expected YYYY-MM-DD, got '{s}'"),
    };
    if !DATE_RE.is_match(s) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())
}

fn parse_time(s: &str) -> Result<NaiveTime, PayloadError> {
    let invalid = || PayloadError::InvalidField {
        field: "time",
        message: format!("expected HH:mm, got '{s}'"),
    };
    if !TIME_RE.is_match(s) {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| invalid())
}

fn validate_gps(raw: RawGps) -> Result<EventGps, PayloadError> {
    let lat = raw.lat.ok_or(PayloadError::MissingField("gps.lat"))?;
    let lng = raw.lng.ok_or(PayloadError::MissingField("gps.lng"))?;

    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(PayloadError::InvalidField {
            field: "gps.lat",
            message: format!("latitude must be within [-90, 90], got {lat}"),
        });
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(PayloadError::InvalidField {
            field: "gps.lng",
            message: format!("longitude must be within [-180, 180], got {lng}"),
        });
    }
    if let Some(acc) = raw.accuracy_meters {
        if !acc.is_finite() || acc < 0.0 {
            return Err(PayloadError::InvalidField {
                field: "gps.accuracyMeters",
                message: format!("accuracy must be a non-negative number, got {acc}"),
            });
        }
    }

    Ok(EventGps {
        lat,
        lng,
        accuracy_meters: raw.accuracy_meters,
    })
}

/// `HH:mm` (de)serialization for [`NaiveTime`].
mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "type": "event",
        "v": 1,
        "title": "Blood donation day",
        "date": "2025-03-14",
        "time": "10:00",
        "location": "Hall A2",
        "points": "5",
        "gps": { "lat": 21.0, "lng": 105.0, "accuracyMeters": 12 },
        "expireAfterMinutes": 60
    }"#;

    #[test]
    fn test_decode_full_payload() {
        let payload = decode_payload(FULL).unwrap();
        assert_eq!(payload.kind, PayloadKind::Event);
        assert_eq!(payload.title, "Blood donation day");
        assert_eq!(payload.date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(payload.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(payload.points_value(), Some(5));
        assert_eq!(payload.expire_after_minutes, Some(60));
        let gps = payload.gps.unwrap();
        assert!((gps.lat - 21.0).abs() < f64::EPSILON);
        assert_eq!(gps.accuracy_meters, Some(12.0));
    }

    #[test]
    fn test_decode_minimal_payload() {
        let raw = r#"{"type":"event","v":1,"title":"Seminar","date":"2025-01-02","time":"08:30","location":"Room 101"}"#;
        let payload = decode_payload(raw).unwrap();
        assert!(payload.gps.is_none());
        assert!(payload.points.is_none());
        assert!(payload.expire_after_minutes.is_none());
    }

    #[test]
    fn test_decode_accepts_numeric_points_and_whitespace() {
        let raw = "  {\"type\":\"event\",\"v\":2,\"title\":\"Run\",\"date\":\"2025-01-02\",\"time\":\"23:59\",\"location\":\"Field\",\"points\":3}\n";
        let payload = decode_payload(raw).unwrap();
        assert_eq!(payload.points.as_deref(), Some("3"));
        assert_eq!(payload.v, 2);
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            decode_payload("https://example.com/not-a-checkin"),
            Err(PayloadError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_payload("[1, 2, 3]"),
            Err(PayloadError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_rejects_other_types() {
        let raw = r#"{"type":"club","v":1,"title":"x","date":"2025-01-02","time":"08:30","location":"y"}"#;
        assert_eq!(
            decode_payload(raw),
            Err(PayloadError::UnsupportedType("club".into()))
        );

        let raw = r#"{"v":1,"title":"x","date":"2025-01-02","time":"08:30","location":"y"}"#;
        assert_eq!(decode_payload(raw), Err(PayloadError::MissingField("type")));
    }

    #[test]
    fn test_rejects_missing_or_blank_fields() {
        let raw = r#"{"type":"event","v":1,"title":"   ","date":"2025-01-02","time":"08:30","location":"y"}"#;
        assert_eq!(decode_payload(raw), Err(PayloadError::MissingField("title")));

        let raw = r#"{"type":"event","title":"x","date":"2025-01-02","time":"08:30","location":"y"}"#;
        assert_eq!(decode_payload(raw), Err(PayloadError::MissingField("v")));
    }

    #[test]
    fn test_rejects_bad_date_and_time() {
        for (date, time, field) in [
            ("2025-02-30", "08:30", "date"),
            ("14/03/2025", "08:30", "date"),
            ("2025-03-14", "8:30", "time"),
            ("2025-03-14", "24:00", "time"),
            ("2025-03-14", "08:30:00", "time"),
        ] {
            let raw = format!(
                r#"{{"type":"event","v":1,"title":"x","date":"{date}","time":"{time}","location":"y"}}"#
            );
            match decode_payload(&raw) {
                Err(PayloadError::InvalidField { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rejects_out_of_range_gps() {
        let raw = r#"{"type":"event","v":1,"title":"x","date":"2025-01-02","time":"08:30","location":"y","gps":{"lat":91,"lng":0}}"#;
        assert!(matches!(
            decode_payload(raw),
            Err(PayloadError::InvalidField { field: "gps.lat", .. })
        ));

        let raw = r#"{"type":"event","v":1,"title":"x","date":"2025-01-02","time":"08:30","location":"y","gps":{"lat":0,"lng":0,"accuracyMeters":-5}}"#;
        assert!(matches!(
            decode_payload(raw),
            Err(PayloadError::InvalidField { field: "gps.accuracyMeters", .. })
        ));
    }

    #[test]
    fn test_rejects_negative_ttl_and_version() {
        let raw = r#"{"type":"event","v":1,"title":"x","date":"2025-01-02","time":"08:30","location":"y","expireAfterMinutes":-1}"#;
        assert!(matches!(
            decode_payload(raw),
            Err(PayloadError::InvalidField { field: "expireAfterMinutes", .. })
        ));

        let raw = r#"{"type":"event","v":0,"title":"x","date":"2025-01-02","time":"08:30","location":"y"}"#;
        assert!(matches!(
            decode_payload(raw),
            Err(PayloadError::InvalidField { field: "v", .. })
        ));
    }

    #[test]
    fn test_integral_floats_are_accepted() {
        let raw = r#"{"type":"event","v":1.0,"title":"x","date":"2025-01-02","time":"08:30","location":"y","expireAfterMinutes":60.0}"#;
        let payload = decode_payload(raw).unwrap();
        assert_eq!(payload.v, 1);
        assert_eq!(payload.expire_after_minutes, Some(60));
    }

    #[test]
    fn test_fractional_numbers_are_invalid_fields() {
        let raw = r#"{"type":"event","v":1,"title":"x","date":"2025-01-02","time":"08:30","location":"y","expireAfterMinutes":1.5}"#;
        assert!(matches!(
            decode_payload(raw),
            Err(PayloadError::InvalidField { field: "expireAfterMinutes", .. })
        ));

        let raw = r#"{"type":"event","v":1.5,"title":"x","date":"2025-01-02","time":"08:30","location":"y"}"#;
        assert!(matches!(
            decode_payload(raw),
            Err(PayloadError::InvalidField { field: "v", .. })
        ));
    }

    #[test]
    fn test_payload_serializes_in_wire_shape() {
        let payload = decode_payload(FULL).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["time"], "10:00");
        assert_eq!(json["date"], "2025-03-14");
        assert_eq!(json["expireAfterMinutes"], 60);
        assert_eq!(json["gps"]["accuracyMeters"], 12.0);
    }

    #[test]
    fn test_starts_at_uses_timezone() {
        let payload = decode_payload(FULL).unwrap();
        let start = payload.starts_at(chrono_tz::Asia::Ho_Chi_Minh).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-14T03:00:00+00:00");
    }
}
