mod config;
mod error;
mod reader;
mod changelog;
mod liveness;
mod privileged;
mod apply;
mod validate;
mod services;
mod api;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::apply::ApplyEngine;
use crate::changelog::ChangeLog;
use crate::config::Config;
use crate::liveness::LivenessCache;
use crate::privileged::SudoRunner;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("netadmind=info"))
        )
        .init();

    tracing::info!("Starting netadmind");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/netadmin/netadmind.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    let config = Arc::new(config);

    tracing::info!("Loaded config from {}", config_path);
    tracing::info!(
        "Managing {} and zones under {}",
        config.paths.dhcp_conf.display(),
        config.paths.bind_dir.display()
    );

    // One log for the whole process, shared by every route
    let log = Arc::new(ChangeLog::new());
    let runner = SudoRunner::from_config(&config.privilege);
    let engine = Arc::new(ApplyEngine::new(config.clone(), log.clone(), runner));

    let app_state = api::routes::AppState {
        config: config.clone(),
        log: log.clone(),
        liveness: LivenessCache::new(),
        engine,
    };
    let app = api::routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    let cancel = CancellationToken::new();

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");
    cancel.cancel();

    if let Err(e) = server_handle.await {
        tracing::error!("Server task failed: {}", e);
    }

    let pending = log.dhcp_len() + log.dns_len();
    if pending > 0 {
        tracing::warn!("Exiting with {} unapplied change(s)", pending);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
