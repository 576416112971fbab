//! HTTP server for the diagram chat proxy.
//!
//! Endpoints:
//! - GET  /api/status        - health check
//! - POST /api/chat          - SSE streaming chat proxy
//! - POST /api/models        - model list for the supplied credentials
//! - GET  /api/config        - load persisted configuration
//! - PUT  /api/config        - persist configuration
//! - POST /api/diagram/edits - apply edit_diagram patches

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use anyhow::Result;
use axum::{
    Router,
    http::{Method, StatusCode, header},
    routing::{get, post, put},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::DrawbridgeConfig;
use crate::provider::ProviderSettings;
use crate::store::ConfigStore;

/// Wall-clock bound on a proxied chat request. The upstream reqwest timeout
/// matches, so blocked streams terminate on both sides.
const CHAT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ProviderSettings>,
    pub store: Arc<ConfigStore>,
}

impl AppState {
    pub fn new(settings: ProviderSettings, store: ConfigStore) -> Self {
        Self {
            settings: Arc::new(settings),
            store: Arc::new(store),
        }
    }
}

/// Create the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api/status", get(handlers::status_handler))
        .route(
            "/api/chat",
            post(handlers::chat_handler).layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(CHAT_TIMEOUT_SECS),
            )),
        )
        .route("/api/models", post(handlers::models_handler))
        .route("/api/config", get(handlers::get_config_handler))
        .route("/api/config", put(handlers::put_config_handler))
        .route("/api/diagram/edits", post(handlers::apply_edits_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server.
pub async fn run(config: &DrawbridgeConfig) -> Result<()> {
    let settings = ProviderSettings::from_config(config);
    let store = match &config.config_path {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::new(ConfigStore::default_path()),
    };
    let state = AppState::new(settings, store);

    let app = create_router(state);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("drawbridge listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
