//! Tracing subscriber setup for the server.
//!
//! Development runs print readable, multi-line events to stdout. Production
//! runs print compact lines to stdout for the service manager and write JSON
//! lines to a daily file in [`Config::log_dir`].

use std::path::PathBuf;

use anyhow::Context;
use checkin_core::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log level when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "CHECKIN_LOG_LEVEL";

const DEFAULT_DIRECTIVES: &str = "info";
const LOG_FILE_PREFIX: &str = "checkin";

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `info` or `checkin_core=debug,tower_http=warn`.
    pub directives: String,

    /// Write JSON files next to the compact stdout stream.
    pub production: bool,

    /// Where the daily files go in production.
    pub directory: PathBuf,
}

impl LogSettings {
    /// Settings for `config`. `RUST_LOG` wins over `CHECKIN_LOG_LEVEL`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::resolve(
            config,
            std::env::var("RUST_LOG").ok(),
            std::env::var(LOG_LEVEL_ENV).ok(),
        )
    }

    fn resolve(config: &Config, rust_log: Option<String>, level: Option<String>) -> Self {
        let directives = [rust_log, level]
            .into_iter()
            .flatten()
            .find(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string());

        Self {
            directives,
            production: config.system.production,
            directory: config.log_dir(),
        }
    }
}

/// Flushes buffered log output when dropped. Hold it until shutdown.
#[must_use = "dropping the guard discards buffered log lines"]
#[derive(Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    _stdout: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the directives do not parse, the log directory cannot
/// be created, or a subscriber is already installed.
pub fn init(settings: &LogSettings) -> anyhow::Result<LogGuard> {
    let filter = EnvFilter::try_new(&settings.directives)
        .with_context(|| format!("invalid log filter {:?}", settings.directives))?;

    let mut guard = LogGuard::default();

    let (file_layer, journal_layer, console_layer) = if settings.production {
        std::fs::create_dir_all(&settings.directory).with_context(|| {
            format!("creating log directory {}", settings.directory.display())
        })?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(&settings.directory)
            .context("opening the rolling log file")?;

        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
        guard = LogGuard {
            _file: Some(file_guard),
            _stdout: Some(stdout_guard),
        };

        let file = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(file_writer)
            .with_file(true)
            .with_line_number(true);
        let journal = fmt::layer()
            .compact()
            .with_ansi(false)
            .with_writer(stdout_writer);
        (Some(file), Some(journal), None)
    } else {
        let console = fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE);
        (None, None, Some(console))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(journal_layer)
        .with(console_layer)
        .try_init()
        .context("installing the tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.system.data_dir = Some(dir.to_path_buf());
        config
    }

    #[test]
    fn test_rust_log_wins_over_service_level() {
        let config = Config::default();
        let settings = LogSettings::resolve(
            &config,
            Some("checkin_core=trace".into()),
            Some("warn".into()),
        );
        assert_eq!(settings.directives, "checkin_core=trace");

        let settings = LogSettings::resolve(&config, Some("  ".into()), Some("warn".into()));
        assert_eq!(settings.directives, "warn");

        let settings = LogSettings::resolve(&config, None, None);
        assert_eq!(settings.directives, "info");
    }

    #[test]
    fn test_directory_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.system.production = true;

        let settings = LogSettings::resolve(&config, None, None);
        assert!(settings.production);
        assert_eq!(settings.directory, dir.path().join("logs"));
    }

    #[test]
    fn test_bad_directives_are_rejected() {
        let settings = LogSettings {
            directives: "info,checkin_core=loud".into(),
            production: false,
            directory: PathBuf::from("unused"),
        };
        assert!(init(&settings).is_err());
    }

    #[test]
    fn test_production_init_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.system.production = true;
        let settings = LogSettings::resolve(&config, None, None);

        let _guard = init(&settings).unwrap();
        assert!(dir.path().join("logs").is_dir());

        // The subscriber is process-global.
        assert!(init(&settings).is_err());
    }
}
