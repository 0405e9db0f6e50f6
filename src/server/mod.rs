//! HTTP surface of the scan engine.

mod error;
mod routes;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::publish::BroadcastPublisher;
use crate::scanner::ScanCoordinator;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ScanCoordinator>,
    pub events: Arc<BroadcastPublisher>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/scan/start", post(routes::start_scan))
        .route("/api/scan/status/{scan_id}", get(routes::scan_status))
        .route("/api/scan/results/{scan_id}", get(routes::scan_results))
        .route("/api/scan/events/{scan_id}", get(routes::scan_events))
        .route("/api/scan/cancel/{scan_id}", post(routes::cancel_scan))
        .layer(cors)
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to install Ctrl-C handler");
            }
            tracing::info!("shutting down");
        })
        .await
}
