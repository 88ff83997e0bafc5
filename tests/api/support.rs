// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared helpers for the HTTP tests: app construction, multipart bodies,
//! a mockable detection backend

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use fabstir_detection_node::{
    api::http_server::{create_app, AppState},
    vision::{
        ClassLabels, DetectionBackend, Detector, ModelHandle, PredictionService, RawDetection,
        TransientStore,
    },
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mockall::mock;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

pub const MODEL_ARTIFACT: &str = "models/best.onnx";
pub const BOUNDARY: &str = "----fabstir-test-boundary";
pub const TEST_UPLOAD_LIMIT: usize = 2 * 1024 * 1024;

mock! {
    pub Backend {}

    impl DetectionBackend for Backend {
        fn name(&self) -> &str;
        fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>>;
    }
}

/// Mock backend with a permissive `name` expectation already set
pub fn mock_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_name().return_const("mock".to_string());
    backend
}

pub fn labels() -> ClassLabels {
    ClassLabels::from_names(["cat", "dog"])
}

pub fn build_app(backend: impl DetectionBackend + 'static, upload_dir: &Path) -> Router {
    build_app_with_limit(backend, upload_dir, TEST_UPLOAD_LIMIT)
}

pub fn build_app_with_limit(
    backend: impl DetectionBackend + 'static,
    upload_dir: &Path,
    max_upload_bytes: usize,
) -> Router {
    let model = ModelHandle::new(MODEL_ARTIFACT, Box::new(backend), labels());
    let detector = Detector::new(Arc::new(model)).with_max_image_bytes(max_upload_bytes);
    let service = PredictionService::new(TransientStore::new(upload_dir), detector);
    create_app(AppState::new(Arc::new(service)), max_upload_bytes)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 120, 40])))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Encode one file field as a multipart/form-data body
pub fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn predict_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn upload_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
