// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for the detection pipeline

use thiserror::Error;

use super::image_utils::ImageError;

/// Failures of the detection request pipeline
///
/// - `InvalidPayload`: no image was supplied (client error, nothing stored)
/// - `Inference`: storage unreadable, model failure, timeout or unknown class id
/// - `ModelLoad`: the model artifact could not be loaded at startup (fatal)
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("No image provided")]
    InvalidPayload,

    #[error("{0}")]
    Inference(String),

    #[error("Failed to load detection model: {0}")]
    ModelLoad(String),
}

impl DetectionError {
    pub fn inference(message: impl Into<String>) -> Self {
        DetectionError::Inference(message.into())
    }

    pub fn model_load(message: impl Into<String>) -> Self {
        DetectionError::ModelLoad(message.into())
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionError::InvalidPayload => "invalid_payload",
            DetectionError::Inference(_) => "inference_error",
            DetectionError::ModelLoad(_) => "model_load_error",
        }
    }

    /// Whether the failure was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, DetectionError::InvalidPayload)
    }
}

impl From<ImageError> for DetectionError {
    fn from(err: ImageError) -> Self {
        DetectionError::Inference(err.to_string())
    }
}
