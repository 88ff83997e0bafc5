// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector: the process-wide model handle and the per-request inference call

use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::detection::RawDetection;
use super::errors::DetectionError;
use super::image_utils::{decode_image_bytes, read_image_file, DEFAULT_MAX_IMAGE_SIZE};
use super::labels::ClassLabels;
use super::store::UploadedImage;
use super::yolo::{YoloConfig, YoloOnnxModel};

/// Default bound on a single inference call
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Inference calls allowed to run at once; the ONNX session runs one at a time
pub const DEFAULT_MAX_CONCURRENT_INFERENCES: usize = 1;

/// An inference primitive turning a decoded image into raw detections
///
/// Implementations must be safe to call from several threads; if the
/// underlying runtime is not, they serialize internally.
pub trait DetectionBackend: Send + Sync {
    fn name(&self) -> &str;

    fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>>;
}

/// The loaded model plus its label mapping
///
/// Built once at startup and shared read-only by all requests.
pub struct ModelHandle {
    artifact: String,
    backend: Box<dyn DetectionBackend>,
    labels: ClassLabels,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("artifact", &self.artifact)
            .field("backend", &self.backend.name())
            .field("classes", &self.labels.len())
            .finish()
    }
}

impl ModelHandle {
    pub fn new(
        artifact: impl Into<String>,
        backend: Box<dyn DetectionBackend>,
        labels: ClassLabels,
    ) -> Self {
        Self {
            artifact: artifact.into(),
            backend,
            labels,
        }
    }

    /// Load a YOLO ONNX artifact
    ///
    /// # Errors
    /// `ModelLoad` if the artifact or its labels cannot be loaded. Callers at
    /// startup treat this as fatal.
    pub async fn load_yolo(config: YoloConfig) -> Result<Self, DetectionError> {
        let artifact = config.model_path.display().to_string();

        let loaded = tokio::task::spawn_blocking(move || YoloOnnxModel::load(&config))
            .await
            .map_err(|e| DetectionError::model_load(format!("loader task failed: {}", e)))?;

        let (model, labels) =
            loaded.map_err(|e| DetectionError::model_load(format!("{:#}", e)))?;

        info!("Model {} ready with {} classes", artifact, labels.len());

        Ok(Self::new(artifact, Box::new(model), labels))
    }

    /// Identifier of the loaded artifact (its path)
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// Resolve a class id, treating unknown ids as an inference failure
    pub fn class_name(&self, class_id: u32) -> Result<&str, DetectionError> {
        self.labels.get(class_id).ok_or_else(|| {
            DetectionError::inference(format!("Unknown class id {} in model output", class_id))
        })
    }
}

/// Runs inference for one stored upload
///
/// Requests wait for an inference permit before they take a thread from the
/// blocking pool. A timed-out call keeps its permit until the backend returns,
/// so requests queued behind it wait without pinning threads.
#[derive(Debug, Clone)]
pub struct Detector {
    model: Arc<ModelHandle>,
    timeout: Duration,
    max_image_bytes: usize,
    inference_permits: Arc<Semaphore>,
}

impl Detector {
    pub fn new(model: Arc<ModelHandle>) -> Self {
        Self {
            model,
            timeout: DEFAULT_INFERENCE_TIMEOUT,
            max_image_bytes: DEFAULT_MAX_IMAGE_SIZE,
            inference_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_INFERENCES)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn with_max_concurrent_inferences(mut self, permits: usize) -> Self {
        self.inference_permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn class_name(&self, class_id: u32) -> Result<&str, DetectionError> {
        self.model.class_name(class_id)
    }

    /// Read the upload's backing file and run the model on it
    ///
    /// Decoding and inference run on the blocking pool. The wait for an
    /// inference permit and the inference itself are bounded by the
    /// configured timeout. A panic inside the backend is contained to this
    /// request.
    ///
    /// # Errors
    /// `Inference` if the file is unreadable or not an image, the backend
    /// fails or panics, or the timeout elapses.
    pub async fn detect(&self, image: &UploadedImage) -> Result<Vec<RawDetection>, DetectionError> {
        let bytes = read_image_file(image.backing_path(), self.max_image_bytes).await?;

        let max_bytes = self.max_image_bytes;
        let (decoded, info) =
            tokio::task::spawn_blocking(move || decode_image_bytes(&bytes, max_bytes))
                .await
                .map_err(|e| {
                    DetectionError::inference(format!("Image decode task aborted: {}", e))
                })??;

        debug!(
            "Decoded upload {}: {}x{}, {} bytes",
            image.id(),
            info.width,
            info.height,
            info.size_bytes
        );

        match tokio::time::timeout(self.timeout, self.run_inference(image, decoded)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Inference timed out for upload {} after {:?}",
                    image.id(),
                    self.timeout
                );
                Err(DetectionError::inference(format!(
                    "Inference timed out after {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    async fn run_inference(
        &self,
        image: &UploadedImage,
        decoded: DynamicImage,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let permit = Arc::clone(&self.inference_permits)
            .acquire_owned()
            .await
            .map_err(|_| DetectionError::inference("Inference queue is closed"))?;

        let model = Arc::clone(&self.model);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            model.backend.infer(&decoded)
        });

        match task.await {
            Ok(Ok(detections)) => Ok(detections),
            Ok(Err(e)) => {
                warn!("Inference failed for upload {}: {:#}", image.id(), e);
                Err(DetectionError::inference(format!("Inference failed: {:#}", e)))
            }
            Err(join_err) => {
                warn!("Inference task aborted for upload {}: {}", image.id(), join_err);
                Err(DetectionError::inference(format!(
                    "Inference task aborted: {}",
                    join_err
                )))
            }
        }
    }
}
