//! slabscan-api - Card Scan Valuation Service
//!
//! Estimates a graded trading card's identity and fair market value from a
//! photo, persists the scan, and lets the user confirm low-confidence
//! results. Serves the mobile client over HTTP REST.

use anyhow::Result;
use slabscan_common::config::AppConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slabscan_api::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting slabscan-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load();
    info!(
        port = config.port,
        vision_configured = config.vision.is_some(),
        marketplace_configured = config.marketplace.is_some(),
        "Configuration resolved"
    );

    let state = AppState::new(config)?;
    let port = state.config.port;
    let app = slabscan_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on http://0.0.0.0:{port}");
    info!("Health check: http://0.0.0.0:{port}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
