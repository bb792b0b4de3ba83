//! # checkin-core
//!
//! Core logic for event QR check-in.
//!
//! This crate provides:
//! - Decoding of scanned event QR payloads
//! - Time-window and geofence eligibility checks
//! - An idempotent check-in log keyed by event title, date and time
//! - Device sensor (GPS, camera) access with explicit timeouts
//! - Configuration management
//!
//! ## Architecture
//!
//! - [`payload`] - QR payload decoding and validation
//! - [`window`] - Check-in time window (event start + TTL)
//! - [`geo`] - Haversine distance and geofence sizing
//! - [`eligibility`] - Combined allow/deny verdict
//! - [`record`] - Check-in records and their composite key
//! - [`storage`] - Check-in repositories (in-memory, JSON file)
//! - [`sensors`] - Async GPS/camera capability
//! - [`service`] - End-to-end check-in orchestration
//! - [`config`] - Configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod eligibility;
pub mod error;
pub mod geo;
pub mod payload;
pub mod record;
pub mod sensors;
pub mod service;
pub mod storage;
pub mod window;

// Re-export primary types for convenience
pub use self::config::{
    default_config_path, is_valid_timezone, Config, ConfigError, ConfigResult, GeofenceConfig,
    SensorConfig, ServerConfig, SystemConfig,
};
pub use eligibility::{evaluate, EligibilityVerdict, Rejection};
pub use error::{CheckinError, Result};
pub use geo::{haversine_distance_meters, GeoPosition, GeofenceCheck, GeofencePolicy};
pub use payload::{decode_payload, EventGps, EventPayload, PayloadError, PayloadKind};
pub use record::{CheckinKey, CheckinRecord};
pub use sensors::{DeviceSensors, ReportedSensors, SensorError, SensorKind};
pub use service::{CheckinPolicy, CheckinService};
pub use storage::{
    default_data_dir, CheckinRepository, JsonFileRepository, MemoryRepository,
    CHECKIN_STORAGE_KEY,
};
pub use window::{check_time_window, TimeWindowCheck};
