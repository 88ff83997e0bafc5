// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Prediction pipeline tests
//!
//! These tests verify that:
//! - Concurrent requests each see their own image
//! - Backend failures, panics and timeouts surface as inference errors
//! - No backing file outlives its request on any path

use fabstir_detection_node::vision::{
    ClassLabels, DetectionBackend, DetectionError, Detector, ImageUpload, ModelHandle,
    PredictionService, RawDetection, TransientStore,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Reports one detection covering the whole image it was given
struct WholeImageBackend;

impl DetectionBackend for WholeImageBackend {
    fn name(&self) -> &str {
        "whole-image"
    }

    fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        std::thread::sleep(Duration::from_millis(10));
        Ok(vec![RawDetection::new(
            0,
            0.75,
            [0.0, 0.0, image.width() as f64, image.height() as f64],
        )])
    }
}

struct SlowBackend(Duration);

impl DetectionBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn infer(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        std::thread::sleep(self.0);
        Ok(vec![])
    }
}

struct PanickingBackend;

impl DetectionBackend for PanickingBackend {
    fn name(&self) -> &str {
        "panicking"
    }

    fn infer(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        panic!("backend crashed");
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 128, 255])))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn service(dir: &Path, backend: impl DetectionBackend + 'static) -> PredictionService {
    let model = ModelHandle::new(
        "models/best.onnx",
        Box::new(backend),
        ClassLabels::from_names(["person"]),
    );
    PredictionService::new(TransientStore::new(dir), Detector::new(Arc::new(model)))
}

fn upload(width: u32, height: u32) -> Option<ImageUpload> {
    Some(ImageUpload::new(Some("photo.png".into()), png(width, height)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_see_their_own_image() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(service(dir.path(), WholeImageBackend));

    let sizes: Vec<(u32, u32)> = (1..=8).map(|i| (10 * i, 7 * i)).collect();
    let handles: Vec<_> = sizes
        .iter()
        .map(|&(w, h)| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { (w, h, service.predict(upload(w, h)).await) })
        })
        .collect();

    for handle in handles {
        let (w, h, result) = handle.await.unwrap();
        let result = result.unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.detections[0].bbox, [0.0, 0.0, w as f64, h as f64]);
        assert_eq!(result.detections[0].class_name, "person");
    }

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_timeout_is_inference_error() {
    let dir = tempfile::tempdir().unwrap();
    let model = ModelHandle::new(
        "models/best.onnx",
        Box::new(SlowBackend(Duration::from_millis(500))),
        ClassLabels::from_names(["person"]),
    );
    let detector = Detector::new(Arc::new(model)).with_timeout(Duration::from_millis(20));
    let service = PredictionService::new(TransientStore::new(dir.path()), detector);

    let err = service.predict(upload(8, 8)).await.unwrap_err();

    assert!(matches!(err, DetectionError::Inference(_)));
    assert!(err.to_string().contains("timed out"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_backend_panic_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path(), PanickingBackend);

    let err = service.predict(upload(8, 8)).await.unwrap_err();

    assert!(matches!(err, DetectionError::Inference(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    // The service keeps answering after a crashed request
    let err = service.predict(None).await.unwrap_err();
    assert!(matches!(err, DetectionError::InvalidPayload));
}

#[tokio::test]
async fn test_oversized_image_is_rejected_before_inference() {
    let dir = tempfile::tempdir().unwrap();
    let model = ModelHandle::new(
        "models/best.onnx",
        Box::new(PanickingBackend),
        ClassLabels::from_names(["person"]),
    );
    let detector = Detector::new(Arc::new(model)).with_max_image_bytes(16);
    let service = PredictionService::new(TransientStore::new(dir.path()), detector);

    let err = service.predict(upload(32, 32)).await.unwrap_err();

    assert!(matches!(err, DetectionError::Inference(_)));
    assert!(!err.to_string().contains("panicked"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
