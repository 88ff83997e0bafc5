// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO object detection via ONNX Runtime
//!
//! Components:
//! - `preprocessing` - letterbox resize and tensor layout
//! - `postprocessing` - head decoding, NMS, mapping back to source pixels
//! - `model` - the ONNX session wrapper implementing `DetectionBackend`

pub mod model;
pub mod postprocessing;
pub mod preprocessing;

pub use model::{YoloConfig, YoloOnnxModel};
pub use postprocessing::{Candidate, OutputLayout, YoloParams};
pub use preprocessing::{PreprocessInfo, DEFAULT_INPUT_SIZE};
