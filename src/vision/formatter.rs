// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Result formatter: raw model output to the canonical detection schema
//!
//! A pure structural transform. Detections are neither reordered, filtered
//! nor deduplicated; each one gets its class name resolved and its numbers
//! rounded.
//!
//! Rounding rule: `(v * 10^n).round() / 10^n` on `f64`, half away from zero,
//! applied to the binary value. `0.123456` becomes `0.1235`; `10.005`
//! (stored as `10.00499...`) becomes `10.0`.

use super::detection::{Detection, DetectionResult, RawDetection};
use super::errors::DetectionError;
use super::labels::ClassLabels;

pub const CONFIDENCE_DECIMALS: i32 = 4;
pub const BBOX_DECIMALS: i32 = 2;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // normalise -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Format one raw detection
///
/// # Errors
/// `Inference` when the class id is unknown to the model's label table, or
/// when the raw values are not finite or violate the box/confidence bounds.
pub fn format_detection(
    raw: &RawDetection,
    labels: &ClassLabels,
) -> Result<Detection, DetectionError> {
    let class_name = labels.get(raw.class_id).ok_or_else(|| {
        DetectionError::inference(format!("Unknown class id {} in model output", raw.class_id))
    })?;

    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(DetectionError::inference(format!(
            "Malformed detection: confidence {} outside [0, 1]",
            raw.confidence
        )));
    }

    let [x1, y1, x2, y2] = raw.bbox;
    if raw.bbox.iter().any(|v| !v.is_finite()) || x1 > x2 || y1 > y2 {
        return Err(DetectionError::inference(format!(
            "Malformed detection: bounding box {:?}",
            raw.bbox
        )));
    }

    Ok(Detection {
        class_id: raw.class_id,
        class_name: class_name.to_string(),
        confidence: round_to(raw.confidence, CONFIDENCE_DECIMALS),
        bbox: raw.bbox.map(|v| round_to(v, BBOX_DECIMALS)),
    })
}

/// Format the full output of one inference call
pub fn format_detections(
    raw: &[RawDetection],
    labels: &ClassLabels,
) -> Result<DetectionResult, DetectionError> {
    let detections = raw
        .iter()
        .map(|r| format_detection(r, labels))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DetectionResult::new(detections))
}
