//! Application configuration management.
//!
//! Handles loading, saving, and validating check-in configuration including:
//! - Timezone used to interpret event dates and times
//! - Geofence sizing (minimum radius, accuracy multiplier)
//! - Sensor timeouts
//! - Data directory and server bind address
//!
//! Values are layered: built-in defaults, then the TOML file, then
//! `CHECKIN__<SECTION>__<KEY>` environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{DEFAULT_ACCURACY_MULTIPLIER, DEFAULT_MIN_RADIUS_METERS};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CHECKIN";

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file at the given path.
    #[error("configuration file not found: {0}")]
    NotFound(String),

    /// The file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The layered sources could not be merged or deserialized.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field failed validation.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timezone, storage and runtime mode.
    pub system: SystemConfig,

    /// Geofence sizing.
    pub geofence: GeofenceConfig,

    /// Sensor timeouts.
    pub sensors: SensorConfig,

    /// HTTP server settings.
    pub server: ServerConfig,
}

/// System-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// IANA timezone in which event dates and times are written.
    pub timezone: String,

    /// Directory holding the check-in log. Platform default when unset.
    pub data_dir: Option<PathBuf>,

    /// Directory for production log files. `<data_dir>/logs` when unset.
    pub log_dir: Option<PathBuf>,

    /// Production mode (JSON file logging).
    pub production: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            data_dir: None,
            log_dir: None,
            production: false,
        }
    }
}

/// Geofence sizing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// Floor for the fence radius, in meters.
    pub min_radius_meters: f64,

    /// Factor applied to reported GPS accuracies.
    pub accuracy_multiplier: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            min_radius_meters: DEFAULT_MIN_RADIUS_METERS,
            accuracy_multiplier: DEFAULT_ACCURACY_MULTIPLIER,
        }
    }
}

/// Sensor timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// GPS acquisition timeout in seconds.
    pub gps_timeout_secs: u64,

    /// Camera capture timeout in seconds.
    pub camera_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            gps_timeout_secs: 15,
            camera_timeout_secs: 30,
        }
    }
}

impl SensorConfig {
    /// GPS timeout as a [`Duration`].
    #[must_use]
    pub const fn gps_timeout(&self) -> Duration {
        Duration::from_secs(self.gps_timeout_secs)
    }

    /// Camera timeout as a [`Duration`].
    #[must_use]
    pub const fn camera_timeout(&self) -> Duration {
        Duration::from_secs(self.camera_timeout_secs)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, layering environment overrides on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, a parse
    /// error if a source is malformed, or validation errors.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::build(Some(path))
    }

    /// Loads configuration from `path` if it exists, defaults otherwise.
    /// Environment overrides apply in both cases.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::build(Some(path))
        } else {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            Self::build(None)
        }
    }

    /// Parses configuration from a TOML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn build(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder
                .add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }
        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validates all fields, collecting every problem.
    ///
    /// # Errors
    ///
    /// Returns the single error, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if !is_valid_timezone(&self.system.timezone) {
            errors.push(ConfigError::invalid(
                "system.timezone",
                format!("unknown IANA timezone '{}'", self.system.timezone),
            ));
        }
        let radius = self.geofence.min_radius_meters;
        if !radius.is_finite() || radius <= 0.0 {
            errors.push(ConfigError::invalid(
                "geofence.min_radius_meters",
                format!("must be a positive number of meters, got {radius}"),
            ));
        }
        let multiplier = self.geofence.accuracy_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            errors.push(ConfigError::invalid(
                "geofence.accuracy_multiplier",
                format!("must be at least 1, got {multiplier}"),
            ));
        }
        if self.sensors.gps_timeout_secs == 0 {
            errors.push(ConfigError::invalid("sensors.gps_timeout_secs", "must be non-zero"));
        }
        if self.sensors.camera_timeout_secs == 0 {
            errors.push(ConfigError::invalid(
                "sensors.camera_timeout_secs",
                "must be non-zero",
            ));
        }
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::invalid(
                "server.bind_address",
                format!("'{}' is not a socket address", self.server.bind_address),
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Parsed timezone. Falls back to UTC if unvalidated input is invalid.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.system.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// Directory holding the check-in log.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.system
            .data_dir
            .clone()
            .unwrap_or_else(crate::storage::default_data_dir)
    }

    /// Directory for rolling log files.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.system
            .log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("logs"))
    }
}

/// Whether `tz` names a known IANA timezone.
#[must_use]
pub fn is_valid_timezone(tz: &str) -> bool {
    tz.parse::<Tz>().is_ok()
}

/// Default configuration file path.
///
/// On Linux: `/etc/checkin/config.toml`.
/// Elsewhere: the platform config directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/checkin/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "checkin").map_or_else(
            || PathBuf::from("config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}
