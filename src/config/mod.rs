// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Values are supplied by the CLI (`crate::cli`), which also reads them from
//! the environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::vision::image_utils::DEFAULT_MAX_IMAGE_SIZE;
use crate::vision::yolo::{YoloConfig, YoloParams, DEFAULT_INPUT_SIZE};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL_PATH: &str = "models/best.onnx";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;
pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_INTRA_THREADS: usize = 4;

/// Configuration for the detection service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Interface to bind
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// ONNX model artifact, also reported by `/health`
    pub model_path: PathBuf,
    /// Optional labels file; labels are read from model metadata otherwise
    pub labels_path: Option<PathBuf>,
    /// Directory holding transient uploads
    pub upload_dir: PathBuf,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Square model input side in pixels
    pub input_size: u32,
    pub inference_timeout_ms: u64,
    pub max_upload_bytes: usize,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl ServiceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port must be greater than 0".to_string());
        }
        if self.host.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid host address: {}", self.host));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be between 0 and 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be between 0 and 1".to_string());
        }
        if self.max_detections == 0 {
            return Err("Max detections must be greater than 0".to_string());
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err("Model input size must be a positive multiple of 32".to_string());
        }
        if self.inference_timeout_ms == 0 {
            return Err("Inference timeout must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Max upload size must be greater than 0".to_string());
        }
        if self.intra_threads == 0 {
            return Err("Inference threads must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| format!("Invalid host address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn yolo_config(&self) -> YoloConfig {
        YoloConfig {
            model_path: self.model_path.clone(),
            labels_path: self.labels_path.clone(),
            input_size: self.input_size,
            params: YoloParams {
                confidence_threshold: self.confidence_threshold,
                iou_threshold: self.iou_threshold,
                max_detections: self.max_detections,
            },
            intra_threads: self.intra_threads,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: None,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            input_size: DEFAULT_INPUT_SIZE,
            inference_timeout_ms: DEFAULT_INFERENCE_TIMEOUT_MS,
            max_upload_bytes: DEFAULT_MAX_IMAGE_SIZE,
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}
