//! Ingest API for the violation analysis pipeline
//!
//! Receives frames pushed by the frame source, routes them to per-session
//! analysis workers, and exposes health and per-session statistics.

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use scooper_watch_analyzer::SessionManager;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::*;
pub use types::*;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Session manager routing frames to per-session workers
    pub manager: Arc<SessionManager>,
}

impl ApiState {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Frame ingest
        .route("/api/v1/frames", post(ingest_frame))
        // Per-session statistics
        .route("/api/v1/sessions/{session_id}/stats", get(get_session_stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server; resolves after a shutdown signal drains the
/// sessions
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting ingest API server on {}", addr);

    let manager = Arc::clone(&state.manager);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, draining sessions");
    manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
