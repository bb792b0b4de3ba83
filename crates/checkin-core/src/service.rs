//! Check-in orchestration.
//!
//! [`CheckinService`] runs one attempt end to end: decode the code, check the
//! time window, sample GPS only if the event is fenced, check the fence,
//! refuse duplicates, capture the confirmation image, then record.
//! A record is written only when every step succeeded.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::config::Config;
use crate::eligibility::{evaluate, EligibilityVerdict};
use crate::error::{CheckinError, Result};
use crate::geo::{GeoPosition, GeofencePolicy};
use crate::payload::{decode_payload, EventPayload};
use crate::record::{CheckinKey, CheckinRecord};
use crate::sensors::{acquire_position, capture_image, DeviceSensors, DEFAULT_GPS_TIMEOUT};
use crate::storage::CheckinRepository;
use crate::window::check_time_window;

/// Rules applied to every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinPolicy {
    /// Timezone in which payload dates and times are interpreted.
    pub timezone: Tz,

    /// Fence sizing.
    pub geofence: GeofencePolicy,

    /// GPS acquisition timeout.
    pub gps_timeout: Duration,

    /// Camera capture timeout.
    pub camera_timeout: Duration,
}

impl Default for CheckinPolicy {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Ho_Chi_Minh,
            geofence: GeofencePolicy::default(),
            gps_timeout: DEFAULT_GPS_TIMEOUT,
            camera_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for CheckinPolicy {
    fn from(config: &Config) -> Self {
        Self {
            timezone: config.timezone(),
            geofence: GeofencePolicy::from(&config.geofence),
            gps_timeout: config.sensors.gps_timeout(),
            camera_timeout: config.sensors.camera_timeout(),
        }
    }
}

/// Runs check-ins against a repository.
pub struct CheckinService<R> {
    repository: R,
    policy: CheckinPolicy,
}

impl<R: CheckinRepository> CheckinService<R> {
    /// Creates a service over `repository`.
    pub const fn new(repository: R, policy: CheckinPolicy) -> Self {
        Self { repository, policy }
    }

    /// Active policy.
    pub const fn policy(&self) -> &CheckinPolicy {
        &self.policy
    }

    /// Replaces the policy. Applies to subsequent attempts only.
    pub fn set_policy(&mut self, policy: CheckinPolicy) {
        self.policy = policy;
    }

    /// Decodes `raw` and evaluates eligibility without side effects.
    ///
    /// Duplicates are not considered here; see [`Self::find`].
    ///
    /// # Errors
    ///
    /// Returns a payload error if the code cannot be decoded.
    pub fn verify(
        &self,
        raw: &str,
        device: Option<&GeoPosition>,
        now: DateTime<Utc>,
    ) -> Result<(EventPayload, EligibilityVerdict)> {
        let payload = decode_payload(raw)?;
        let starts_at = self.resolve_start(&payload)?;
        let verdict = evaluate(&payload, starts_at, device, &self.policy.geofence, now);
        Ok((payload, verdict))
    }

    /// Performs a check-in for the scanned code `raw` at `now`.
    ///
    /// # Errors
    ///
    /// - payload errors for an unusable code
    /// - [`CheckinError::TimeWindowClosed`] / [`CheckinError::OutsideGeofence`]
    /// - [`CheckinError::DuplicateCheckin`] if this event is already recorded
    /// - sensor errors when GPS or camera fail
    /// - persistence errors
    pub async fn check_in<S>(
        &mut self,
        raw: &str,
        sensors: &S,
        now: DateTime<Utc>,
    ) -> Result<CheckinRecord>
    where
        S: DeviceSensors + ?Sized,
    {
        let result = self.try_check_in(raw, sensors, now).await;
        match &result {
            Ok(record) => info!(
                key = %record.composite_key,
                distance_meters = ?record.distance_meters,
                "Check-in recorded"
            ),
            Err(e) => warn!(error_code = e.error_code(), error = %e, "Check-in rejected"),
        }
        result
    }

    async fn try_check_in<S>(
        &mut self,
        raw: &str,
        sensors: &S,
        now: DateTime<Utc>,
    ) -> Result<CheckinRecord>
    where
        S: DeviceSensors + ?Sized,
    {
        let payload = decode_payload(raw)?;
        let starts_at = self.resolve_start(&payload)?;

        // No point waking the GPS for a code that has already expired.
        let window = check_time_window(starts_at, payload.expire_after_minutes, now);
        let position = if window.within_window && payload.gps.is_some() {
            Some(acquire_position(sensors, self.policy.gps_timeout).await?)
        } else {
            None
        };

        let verdict = evaluate(
            &payload,
            starts_at,
            position.as_ref(),
            &self.policy.geofence,
            now,
        )
        .into_result()?;

        let key = CheckinKey::for_payload(&payload);
        if self.repository.find(&key)?.is_some() {
            return Err(CheckinError::DuplicateCheckin(key));
        }

        let image = capture_image(sensors, self.policy.camera_timeout).await?;

        let record = CheckinRecord::new(
            payload,
            now,
            position,
            verdict.geofence.map(|g| g.distance_meters),
            image,
        );
        if !self.repository.insert_if_absent(record.clone())? {
            return Err(CheckinError::DuplicateCheckin(key));
        }
        Ok(record)
    }

    /// Record for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::CheckinNotFound`] if absent.
    pub fn find(&self, key: &CheckinKey) -> Result<CheckinRecord> {
        self.repository
            .find(key)?
            .ok_or_else(|| CheckinError::CheckinNotFound(key.clone()))
    }

    /// Every recorded check-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn history(&self) -> Result<Vec<CheckinRecord>> {
        self.repository.list()
    }

    /// DRL points earned through recorded check-ins. Non-numeric `points`
    /// values are ignored.
    ///
    /// Summed as `u64`: each code may claim up to `u32::MAX` points.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn total_points(&self) -> Result<u64> {
        Ok(self
            .repository
            .list()?
            .iter()
            .filter_map(|r| r.payload.points_value())
            .map(u64::from)
            .sum())
    }

    fn resolve_start(&self, payload: &EventPayload) -> Result<DateTime<Utc>> {
        payload.starts_at(self.policy.timezone).ok_or_else(|| {
            CheckinError::NonexistentStartTime(
                payload.local_start().format("%Y-%m-%d %H:%M").to_string(),
            )
        })
    }
}
