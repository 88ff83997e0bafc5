// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Health endpoint and router wiring tests

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use tower::util::ServiceExt; // for `oneshot`

use super::support::{body_json, build_app, mock_backend, MODEL_ARTIFACT};

#[tokio::test]
async fn test_health_reports_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(mock_backend(), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"message": "AI Service Running", "model": MODEL_ARTIFACT})
    );
}

#[tokio::test]
async fn test_health_allows_any_origin() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(mock_backend(), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(mock_backend(), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/v1/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
