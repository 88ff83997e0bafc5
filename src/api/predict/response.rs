// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::{Deserialize, Serialize};

use crate::vision::{Detection, DetectionResult};

pub const PREDICTION_MESSAGE: &str = "Prediction successful";

/// Response from POST /predict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub message: String,
    /// Detections in model output order
    pub detections: Vec<Detection>,
    /// Always equals `detections.len()`
    pub count: usize,
}

impl From<DetectionResult> for PredictResponse {
    fn from(result: DetectionResult) -> Self {
        Self {
            message: PREDICTION_MESSAGE.to_string(),
            detections: result.detections,
            count: result.count,
        }
    }
}
