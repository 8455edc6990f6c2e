//! Main HTTP Gateway Server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::handlers;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub router: Arc<intentforge_router::Router>,
}

impl GatewayState {
    pub fn new(router: intentforge_router::Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/interpret", post(handlers::interpret))
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` fires.
#[instrument(skip(state, shutdown))]
pub async fn start_server(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(addr = %listener.local_addr().unwrap_or(addr), "Gateway HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("Gateway server failed")?;
    info!("Gateway HTTP server stopped");
    Ok(())
}
