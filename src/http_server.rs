/// HTTP Server Module
///
/// Optional read-only endpoints for checking on a running agent.

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use std::net::SocketAddr;

use crate::shutdown::Shutdown;
use crate::status::{AgentStatus, SharedStatus};

#[derive(Clone)]
pub struct AppState {
    pub status: SharedStatus,
}

/// Create and configure the HTTP server router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_endpoint))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "ok",
        "service": "tweet_scheduler_bot",
        "timestamp": Utc::now().to_rfc3339()
    })))
}

/// Posting status endpoint
async fn status_endpoint(State(state): State<AppState>) -> Json<AgentStatus> {
    Json(state.status.read().await.clone())
}

/// Serve the router on `port` until shutdown is signalled.
pub async fn serve(port: u16, state: AppState, shutdown: Shutdown) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind status server to {}", addr))?;

    log::info!("Status server listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await
        .context("Status server failed")?;

    Ok(())
}
