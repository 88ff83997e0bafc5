// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::http_server::AppState;

pub const HEALTH_MESSAGE: &str = "AI Service Running";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub message: String,
    pub model: String,
}

/// GET /health - Liveness plus the identifier of the loaded model
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE.to_string(),
        model: state.model_artifact().to_string(),
    })
}
