// src/server/mod.rs
//! HTTP surface: `POST /forecast` and `GET /health`.

pub mod handlers;

use crate::utils::AppError;
use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/forecast", post(handlers::forecast_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C.
pub async fn serve(state: Arc<AppState>, bind_addr: &str) -> Result<(), AppError> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid bind address '{}': {}", bind_addr, e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Forecast API listening on http://{}", addr);
    tracing::info!("  POST http://{}/forecast", addr);
    tracing::info!("  GET  http://{}/health", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("API server shutting down");
        })
        .await?;
    Ok(())
}
