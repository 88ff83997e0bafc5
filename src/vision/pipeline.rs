// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request orchestration: store → detect → format → release
//!
//! Per-request state machine:
//!
//! ```text
//! Received → Stored → Inferred → Formatted → Released → Responded
//!     └──────────┴──────────┴───────→ Errored → Released (if Stored was reached)
//! ```
//!
//! The stored upload is released exactly once on every path that reached
//! `Stored`. A missing payload fails before anything is stored.

use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::detection::DetectionResult;
use super::detector::Detector;
use super::errors::DetectionError;
use super::formatter::format_detections;
use super::store::{ImageUpload, TransientStore, UploadedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Stored,
    Inferred,
    Formatted,
    Released,
    Responded,
    Errored,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStage::Received => "received",
            RequestStage::Stored => "stored",
            RequestStage::Inferred => "inferred",
            RequestStage::Formatted => "formatted",
            RequestStage::Released => "released",
            RequestStage::Responded => "responded",
            RequestStage::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Runs one detection request end to end
///
/// Holds no per-request state, so a single instance serves all concurrent
/// requests.
#[derive(Debug, Clone)]
pub struct PredictionService {
    store: TransientStore,
    detector: Detector,
}

impl PredictionService {
    pub fn new(store: TransientStore, detector: Detector) -> Self {
        Self { store, detector }
    }

    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Identifier of the model serving requests
    pub fn model_artifact(&self) -> &str {
        self.detector.model().artifact()
    }

    /// Run the pipeline for one payload
    ///
    /// # Errors
    /// - `InvalidPayload` if no image was supplied (nothing was stored)
    /// - `Inference` for any failure after the upload was stored; the upload
    ///   has been released by the time the error is returned
    pub async fn predict(
        &self,
        payload: Option<ImageUpload>,
    ) -> Result<DetectionResult, DetectionError> {
        let started = Instant::now();
        debug!("Detection request {}", RequestStage::Received);

        let mut image = match self.store.store(payload).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Detection request {} before storage: {}", RequestStage::Errored, e);
                return Err(e);
            }
        };
        debug!("Upload {} {}", image.id(), RequestStage::Stored);

        let outcome = self.run_stored(&image).await;
        if let Err(e) = &outcome {
            warn!("Upload {} {} ({}): {}", image.id(), RequestStage::Errored, e.kind(), e);
        }

        self.store.release(&mut image).await;
        debug!("Upload {} {}", image.id(), RequestStage::Released);

        if let Ok(result) = &outcome {
            info!(
                "Detection complete for upload {}: {} objects in {}ms",
                image.id(),
                result.count,
                started.elapsed().as_millis()
            );
        }

        outcome
    }

    async fn run_stored(&self, image: &UploadedImage) -> Result<DetectionResult, DetectionError> {
        let raw = self.detector.detect(image).await?;
        debug!("Upload {} {} ({} raw detections)", image.id(), RequestStage::Inferred, raw.len());

        let result = format_detections(&raw, self.detector.model().labels())?;
        debug!("Upload {} {}", image.id(), RequestStage::Formatted);

        Ok(result)
    }
}
