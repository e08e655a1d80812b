//! slabscan-api library interface
//!
//! Exposes `AppState` and `build_router` so integration tests can drive the
//! real router without binding a socket.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use slabscan_common::config::AppConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::services::{CertLookupClient, MarketCompsClient, ScanAnalyzer, ScanStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<AppConfig>,
    /// In-memory scan record store
    pub store: Arc<ScanStore>,
    /// Per-scan orchestrator owning the provider clients
    pub analyzer: Arc<ScanAnalyzer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let resolver = services::vision::resolver_from_config(config.vision.clone())?;
        let cert_client = CertLookupClient::new()?;
        let comps_client = MarketCompsClient::new(config.marketplace.clone())?;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(ScanStore::new()),
            analyzer: Arc::new(ScanAnalyzer::new(resolver, cert_client, comps_client)),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origin);

    Router::new()
        .merge(api::scan_routes())
        .merge(api::health_routes())
        .layer(cors)
        .with_state(state)
}

/// CORS for the mobile client; permissive when the origin is `*`
fn cors_layer(allowed_origin: &str) -> CorsLayer {
    if allowed_origin == "*" {
        return CorsLayer::permissive();
    }
    match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!(allowed_origin = %allowed_origin, "Invalid allowed origin, using permissive CORS");
            CorsLayer::permissive()
        }
    }
}
