//! # checkin-server
//!
//! HTTP server for QR event check-in.
//!
//! ## Running
//!
//! ```bash
//! # Development
//! CHECKIN_CONFIG=./config.toml cargo run --package checkin-server
//!
//! # Production
//! ./checkin-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use checkin_core::Config;
use checkin_server::api;
use checkin_server::logging::{self, LogSettings};
use checkin_server::state::{self, AppState};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = state::config_path();
    // Loading validates, including the bind address.
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let _log_guard = logging::init(&LogSettings::from_config(&config))?;

    info!(
        config_path = %config_path.display(),
        timezone = %config.system.timezone,
        data_dir = %config.data_dir().display(),
        "Starting checkin-server"
    );

    let listener = TcpListener::bind(config.server.bind_address.as_str())
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    let state = AppState::new(config, config_path).into_shared();

    let app = api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
