// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::multipart::MultipartError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vision::DetectionError;

/// Body of every error response: `{"error": "<message>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    PayloadTooLarge(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::InternalError(msg) => msg.clone(),
        };

        ErrorResponse { error: message }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::InvalidPayload => ApiError::InvalidRequest(err.to_string()),
            DetectionError::Inference(msg) => ApiError::InternalError(msg),
            DetectionError::ModelLoad(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::InvalidRequest(format!("Invalid multipart payload: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.to_response())).into_response()
    }
}
