// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction API endpoint module
//!
//! Provides POST /predict for object detection on uploaded images.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::predict_handler;
pub use request::{extract_image_upload, IMAGE_FIELD};
pub use response::PredictResponse;
