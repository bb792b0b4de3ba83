//! Check-in time window.
//!
//! An event code stays valid for `expireAfterMinutes` after the event start.
//! Codes without a TTL never expire. Scanning before the start is allowed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a time-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowCheck {
    /// Whether `now` is at or before the expiry instant.
    pub within_window: bool,

    /// Whole minutes until expiry; negative once expired. `None` without a TTL.
    #[schema(example = 17)]
    pub minutes_remaining: Option<i64>,

    /// Instant the window closes. `None` without a TTL.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TimeWindowCheck {
    /// A check that always passes (no TTL configured).
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            within_window: true,
            minutes_remaining: None,
            expires_at: None,
        }
    }
}

/// Evaluates the window for an event starting at `starts_at`.
///
/// The closing instant itself is still inside the window, so a TTL of zero
/// admits a scan at exactly the start instant and nothing after it.
#[must_use]
pub fn check_time_window(
    starts_at: DateTime<Utc>,
    expire_after_minutes: Option<u32>,
    now: DateTime<Utc>,
) -> TimeWindowCheck {
    let Some(ttl) = expire_after_minutes else {
        return TimeWindowCheck::unbounded();
    };

    let expires_at = starts_at + Duration::minutes(i64::from(ttl));
    TimeWindowCheck {
        within_window: now <= expires_at,
        minutes_remaining: Some((expires_at - now).num_minutes()),
        expires_at: Some(expires_at),
    }
}
