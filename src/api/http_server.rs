// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::health_handler;
use super::predict::predict_handler;
use crate::vision::PredictionService;

/// Headroom on top of the image limit for multipart boundaries and headers
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct AppState {
    predictions: Arc<PredictionService>,
}

impl AppState {
    pub fn new(predictions: Arc<PredictionService>) -> Self {
        Self { predictions }
    }

    pub fn predictions(&self) -> &PredictionService {
        &self.predictions
    }

    pub fn model_artifact(&self) -> &str {
        self.predictions.model_artifact()
    }
}

/// Build the router: `/health`, `/predict`, permissive CORS, request tracing
pub fn create_app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C
pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    let app = create_app(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutting down..."),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
