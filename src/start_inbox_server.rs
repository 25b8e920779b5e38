//! Startup helpers for the networking inbox server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::messaging::core::config::MessagingConfig;
use crate::server::{self, AppState};

/// Run the server (used by the `inbox-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting networking inbox v{}", env!("CARGO_PKG_VERSION"));

    match serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Load configuration and build application state without starting the server.
///
/// The conversation store itself is still created lazily on first request.
///
/// # Errors
/// Returns an error if the environment holds an invalid configuration.
pub fn initialize() -> anyhow::Result<(MessagingConfig, Arc<AppState>)> {
    let config = MessagingConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        path = %config.storage.sqlite_path.display(),
        key = %config.storage.snapshot_key,
        "local storage configured"
    );
    let state = AppState::from_config(&config);
    Ok((config, state))
}

fn serve() -> anyhow::Result<()> {
    let (config, state) = initialize()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    rt.block_on(server::run_server_with_shutdown(
        state,
        config.server.port,
        shutdown_signal(),
    ))
    .with_context(|| format!("failed to serve on port {}", config.server.port))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
