// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::config::{
    ServiceConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_HOST, DEFAULT_INFERENCE_TIMEOUT_MS,
    DEFAULT_INTRA_THREADS, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS, DEFAULT_MODEL_PATH,
    DEFAULT_PORT, DEFAULT_UPLOAD_DIR,
};
use crate::vision::image_utils::DEFAULT_MAX_IMAGE_SIZE;
use crate::vision::yolo::DEFAULT_INPUT_SIZE;

/// Fabstir Detection Node
///
/// Every flag can also be set through the environment variable shown.
#[derive(Parser, Debug)]
#[command(name = "fabstir-detection-node")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "HTTP object detection service", long_about = None)]
pub struct Cli {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// ONNX detection model
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Class labels file (text, JSON object or JSON array)
    #[arg(long, env = "LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Directory for transient uploads
    #[arg(long, env = "UPLOAD_DIR", default_value = DEFAULT_UPLOAD_DIR)]
    pub upload_dir: PathBuf,

    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence_threshold: f32,

    #[arg(long, env = "IOU_THRESHOLD", default_value_t = DEFAULT_IOU_THRESHOLD)]
    pub iou_threshold: f32,

    #[arg(long, env = "MAX_DETECTIONS", default_value_t = DEFAULT_MAX_DETECTIONS)]
    pub max_detections: usize,

    /// Square model input size in pixels
    #[arg(long, env = "MODEL_INPUT_SIZE", default_value_t = DEFAULT_INPUT_SIZE)]
    pub input_size: u32,

    #[arg(long, env = "INFERENCE_TIMEOUT_MS", default_value_t = DEFAULT_INFERENCE_TIMEOUT_MS)]
    pub inference_timeout_ms: u64,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "INFERENCE_THREADS", default_value_t = DEFAULT_INTRA_THREADS)]
    pub intra_threads: usize,
}

impl From<Cli> for ServiceConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            model_path: cli.model_path,
            labels_path: cli.labels_path,
            upload_dir: cli.upload_dir,
            confidence_threshold: cli.confidence_threshold,
            iou_threshold: cli.iou_threshold,
            max_detections: cli.max_detections,
            input_size: cli.input_size,
            inference_timeout_ms: cli.inference_timeout_ms,
            max_upload_bytes: cli.max_upload_bytes,
            intra_threads: cli.intra_threads,
        }
    }
}
