//! Federation Gateway Binary
//!
//! Runs the gateway HTTP server in front of the configured downstream systems.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use federation_gateway::{create_router, AppState, GatewayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = env::var("FEDERATION_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("set tracing subscriber")?;

    let config = GatewayConfig::from_env()?;
    let bridge = config.build_bridge()?;

    let systems = config.enabled_systems();
    if systems.is_empty() {
        warn!("No downstream systems configured; every bridge request will be a no-op");
    }

    info!(
        port = config.port,
        systems = ?systems,
        http_timeout_secs = config.http_timeout.as_secs(),
        deadline_secs = config.request_deadline.as_secs(),
        "Starting federation gateway"
    );

    let state = Arc::new(AppState::new(bridge, config.request_deadline));
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!(addr = %addr, "Federation gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Federation gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
