//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use checkin_core::{
    CheckinPolicy, CheckinService, Config, ConfigResult, JsonFileRepository,
};
use tokio::sync::RwLock;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "CHECKIN_CONFIG";

/// Shared handle to the application state.
///
/// Check-ins take the write lock, so attempts are applied one at a time.
pub type SharedState = Arc<RwLock<AppState>>;

/// Application state.
pub struct AppState {
    /// Effective configuration.
    pub config: Config,

    /// Where [`Self::config`] is persisted.
    pub config_path: PathBuf,

    /// Check-in engine over the on-disk log.
    pub service: CheckinService<JsonFileRepository>,
}

impl AppState {
    /// Builds state from a loaded configuration.
    #[must_use]
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        let repository = JsonFileRepository::in_dir(&config.data_dir());
        let service = CheckinService::new(repository, CheckinPolicy::from(&config));
        Self {
            config,
            config_path,
            service,
        }
    }

    /// Wraps the state for sharing between handlers.
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Persists `config` and, once it is on disk, makes it the effective
    /// configuration of the check-in engine.
    ///
    /// On error nothing changes: the previous configuration and policy stay
    /// in effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn update_config(&mut self, config: Config) -> ConfigResult<()> {
        config.save(&self.config_path)?;
        self.service.set_policy(CheckinPolicy::from(&config));
        self.config = config;
        Ok(())
    }
}

/// Configuration file path: `$CHECKIN_CONFIG` or the platform default.
#[must_use]
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(checkin_core::default_config_path, PathBuf::from)
}
