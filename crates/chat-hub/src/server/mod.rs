//! Hub server setup
//!
//! Provides the WebSocket endpoint, the internal trigger routes and process wiring.

mod handler;
mod internal;
mod state;

pub use handler::gateway_handler;
pub use internal::internal_router;
pub use state::HubState;

use axum::{extract::State, routing::get, Json, Router};
use chat_common::{AppConfig, AppError, JwtService};
use chat_db::{create_pool, PgParticipantView, PoolSettings};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Counters reported by `/stats`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub online: usize,
    /// Conversations with a message or departure fan-out still in flight
    pub pending_fanouts: usize,
}

/// Create the hub router
///
/// The internal routes are only mounted when a service token is configured.
pub fn create_router(state: &HubState) -> Router<HubState> {
    let router = Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/stats", get(stats));

    if state.config().internal_token.is_some() {
        router.nest("/internal", internal_router(state))
    } else {
        tracing::warn!("HUB_INTERNAL_TOKEN not set, internal trigger routes disabled");
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Connection statistics
async fn stats(State(state): State<HubState>) -> Json<HubStats> {
    Json(HubStats {
        connections: state.open_connections(),
        online: state.registry().len(),
        pending_fanouts: state.dispatcher().pending_fanouts(),
    })
}

/// Build the complete application
pub fn create_app(state: HubState) -> Router {
    create_router(&state)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `HubState`
pub async fn create_hub_state(config: &AppConfig) -> Result<HubState, AppError> {
    tracing::info!("Connecting to PostgreSQL...");
    let pool = create_pool(&config.database, &PoolSettings::default())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    tracing::info!("PostgreSQL connection established");

    let participants = Arc::new(PgParticipantView::new(pool));
    let verifier = Arc::new(JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
    ));

    Ok(HubState::new(verifier, participants, config.hub.clone()))
}

/// Run the hub server until ctrl-c
pub async fn run_server(app: Router, addr: &str) -> Result<(), AppError> {
    tracing::info!("Starting hub server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Hub listening on ws://{}/gateway", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    tracing::info!("Hub server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the complete hub server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();

    let state = create_hub_state(&config).await?;
    let app = create_app(state);

    run_server(app, &addr).await
}
