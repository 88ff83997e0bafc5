// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoding of YOLO detection heads
//!
//! YOLOv8-family ONNX exports emit one tensor of shape `[1, 4 + nc, N]`
//! (some exports transpose it to `[1, N, 4 + nc]`). Each anchor column holds
//! `cx, cy, w, h` in model input pixels followed by one score per class.

use anyhow::{Context, Result};
use ndarray::{ArrayViewD, Axis, Ix2};
use std::cmp::Ordering;

use super::preprocessing::PreprocessInfo;
use crate::vision::detection::RawDetection;

/// Thresholds applied after inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, 4 + nc, N]`
    ChannelsFirst,
    /// `[1, N, 4 + nc]`
    ChannelsLast,
}

/// A decoded box in model input space, `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// Work out the orientation of the output tensor
///
/// With a known class count the channel axis is the one equal to `4 + nc`;
/// otherwise the smaller axis is taken as the channel axis (anchors always
/// outnumber classes in practice).
pub fn infer_layout(shape: &[usize], num_classes: Option<usize>) -> Result<(OutputLayout, usize)> {
    if shape.len() != 3 || shape[0] != 1 {
        anyhow::bail!("Unexpected detection output shape: {:?}, expected [1, C, N]", shape);
    }
    let (a, b) = (shape[1], shape[2]);

    let layout = match num_classes {
        Some(nc) if a == nc + 4 => OutputLayout::ChannelsFirst,
        Some(nc) if b == nc + 4 => OutputLayout::ChannelsLast,
        Some(nc) => anyhow::bail!(
            "Detection output shape {:?} does not match {} classes",
            shape,
            nc
        ),
        None if a <= b => OutputLayout::ChannelsFirst,
        None => OutputLayout::ChannelsLast,
    };

    let channels = match layout {
        OutputLayout::ChannelsFirst => a,
        OutputLayout::ChannelsLast => b,
    };
    if channels <= 4 {
        anyhow::bail!("Detection output has no class scores: {:?}", shape);
    }

    Ok((layout, channels - 4))
}

/// Decode all anchors scoring at least the confidence threshold
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    num_classes: Option<usize>,
    params: &YoloParams,
) -> Result<Vec<Candidate>> {
    let (layout, nc) = infer_layout(output.shape(), num_classes)?;

    let table = output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .context("Detection output is not two dimensional after batch axis")?;
    // rows = channels, columns = anchors
    let table = match layout {
        OutputLayout::ChannelsFirst => table,
        OutputLayout::ChannelsLast => table.reversed_axes(),
    };

    let mut candidates = Vec::new();
    for anchor in table.axis_iter(Axis(1)) {
        let (class_id, confidence) = (0..nc)
            .map(|k| (k, anchor[4 + k]))
            .fold((0usize, f32::NEG_INFINITY), |best, (k, score)| {
                if score > best.1 {
                    (k, score)
                } else {
                    best
                }
            });

        if !confidence.is_finite() || confidence < params.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
        if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
            anyhow::bail!(
                "Detection output has a non-finite box for class {}: [{}, {}, {}, {}]",
                class_id,
                cx,
                cy,
                w,
                h
            );
        }

        candidates.push(Candidate {
            class_id: class_id as u32,
            confidence: confidence.min(1.0),
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
        });
    }

    Ok(candidates)
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Class-wise greedy NMS
///
/// Returns survivors in descending confidence order, at most `max_detections`.
pub fn non_maximum_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

/// Map surviving candidates into source-image pixel space
pub fn to_raw_detections(candidates: &[Candidate], info: &PreprocessInfo) -> Vec<RawDetection> {
    candidates
        .iter()
        .map(|c| {
            let (x1, y1) = info.map_to_original(c.bbox[0], c.bbox[1]);
            let (x2, y2) = info.map_to_original(c.bbox[2], c.bbox[3]);
            RawDetection::new(
                c.class_id,
                c.confidence.clamp(0.0, 1.0) as f64,
                [x1 as f64, y1 as f64, x2 as f64, y2 as f64],
            )
        })
        .collect()
}

/// Full postprocessing: decode, NMS, rescale
pub fn postprocess(
    output: ArrayViewD<f32>,
    num_classes: Option<usize>,
    params: &YoloParams,
    info: &PreprocessInfo,
) -> Result<Vec<RawDetection>> {
    let candidates = decode_predictions(output, num_classes, params)?;
    let kept = non_maximum_suppression(candidates, params.iou_threshold, params.max_detections);
    Ok(to_raw_detections(&kept, info))
}
