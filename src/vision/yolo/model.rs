// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime YOLO detector
//!
//! Loads a YOLOv8-family ONNX export and runs it on CPU. The session is
//! behind a mutex: ort needs exclusive access to run a session, so
//! concurrent requests are serialized around the inference call only.

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::postprocessing::{postprocess, YoloParams};
use super::preprocessing::{preprocess_for_detection, DEFAULT_INPUT_SIZE};
use crate::vision::detection::RawDetection;
use crate::vision::detector::DetectionBackend;
use crate::vision::labels::ClassLabels;

/// Metadata key under which Ultralytics exports store class names
const NAMES_METADATA_KEY: &str = "names";

/// Settings for loading a YOLO ONNX model
#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    /// Explicit labels file; when absent labels come from the model metadata
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub params: YoloParams,
    pub intra_threads: usize,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/best.onnx"),
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            params: YoloParams::default(),
            intra_threads: 4,
        }
    }
}

pub struct YoloOnnxModel {
    session: Mutex<Session>,
    input_name: String,
    input_size: u32,
    num_classes: Option<usize>,
    params: YoloParams,
}

impl std::fmt::Debug for YoloOnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloOnnxModel")
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("num_classes", &self.num_classes)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl YoloOnnxModel {
    /// Load the model and its class labels
    ///
    /// Blocking; call from a blocking context.
    ///
    /// # Errors
    /// - model file missing or not a loadable ONNX graph
    /// - no labels file given and no `names` entry in the model metadata
    pub fn load(config: &YoloConfig) -> Result<(Self, ClassLabels)> {
        let model_path = config.model_path.as_path();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("Failed to load detection model from {}", model_path.display())
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        // A labels file need not match the head; the layout then comes from the tensor shape
        let (labels, num_classes) = match &config.labels_path {
            Some(path) => (ClassLabels::from_file(path)?, None),
            None => {
                let labels = labels_from_metadata(&session, model_path)?;
                let num_classes = Some(labels.num_classes()).filter(|n| *n > 0);
                (labels, num_classes)
            }
        };

        debug!(
            "Detection model loaded - input: {}, {} classes",
            input_name,
            labels.len()
        );
        info!("✅ Detection model loaded successfully (CPU-only)");

        let model = Self {
            session: Mutex::new(session),
            input_name,
            input_size: config.input_size,
            num_classes,
            params: config.params,
        };

        Ok((model, labels))
    }

    pub fn params(&self) -> &YoloParams {
        &self.params
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

fn labels_from_metadata(session: &Session, model_path: &Path) -> Result<ClassLabels> {
    let metadata = session
        .metadata()
        .context("Failed to read model metadata")?;
    let names = metadata
        .custom(NAMES_METADATA_KEY)
        .context("Failed to read class names from model metadata")?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Model {} carries no class names; provide a labels file",
                model_path.display()
            )
        })?;

    ClassLabels::from_metadata(&names)
}

impl DetectionBackend for YoloOnnxModel {
    fn name(&self) -> &str {
        "yolo-onnx"
    }

    fn infer(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (input, info) = preprocess_for_detection(image, self.input_size);

        let input_value = Value::from_array(input).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Detection session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        debug!("Detection output shape: {:?}", output.shape());

        let detections = postprocess(output.view(), self.num_classes, &self.params, &info)?;

        debug!("Detected {} objects", detections.len());

        Ok(detections)
    }
}
