// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection records: the model-native form and the canonical output form

use serde::{Deserialize, Serialize};

/// One object as emitted by the detection model, before formatting
///
/// Coordinates are `(x1, y1, x2, y2)` in source-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

impl RawDetection {
    /// Build a raw detection, ordering the corners so that `x1 <= x2` and `y1 <= y2`
    ///
    /// A box with a non-finite corner is kept as given so the formatter can
    /// reject it; `min`/`max` would otherwise drop the NaN.
    pub fn new(class_id: u32, confidence: f64, bbox: [f64; 4]) -> Self {
        if bbox.iter().any(|v| !v.is_finite()) {
            return Self {
                class_id,
                confidence,
                bbox,
            };
        }

        let [ax, ay, bx, by] = bbox;
        Self {
            class_id,
            confidence,
            bbox: [ax.min(bx), ay.min(by), ax.max(bx), ay.max(by)],
        }
    }

    pub fn width(&self) -> f64 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f64 {
        self.bbox[3] - self.bbox[1]
    }
}

/// Canonical detected-object record returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    /// Rounded to 4 decimals, within [0, 1]
    pub confidence: f64,
    /// `[x1, y1, x2, y2]`, each rounded to 2 decimals
    pub bbox: [f64; 4],
}

/// All detections for one image, in the detector's emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub count: usize,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        let count = detections.len();
        Self { detections, count }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
