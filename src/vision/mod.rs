// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection pipeline
//!
//! This module provides:
//! - Transient storage of uploaded images (`store`)
//! - The detector and its process-wide model handle (`detector`, `yolo`)
//! - Conversion of raw model output into the response schema (`formatter`)
//! - Request orchestration with guaranteed cleanup (`pipeline`)

pub mod detection;
pub mod detector;
pub mod errors;
pub mod formatter;
pub mod image_utils;
pub mod labels;
pub mod pipeline;
pub mod store;
pub mod yolo;

pub use detection::{Detection, DetectionResult, RawDetection};
pub use detector::{DetectionBackend, Detector, ModelHandle};
pub use errors::DetectionError;
pub use formatter::{format_detections, round_to};
pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use labels::ClassLabels;
pub use pipeline::{PredictionService, RequestStage};
pub use store::{ImageUpload, TransientStore, UploadedImage};
