// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::{debug, warn};

use super::request::extract_image_upload;
use super::response::PredictResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::RequestStage;

/// POST /predict - Detect objects in an uploaded image
///
/// # Request
/// `multipart/form-data` with a binary field named `image`.
///
/// # Response
/// - `message`: "Prediction successful"
/// - `detections`: `class_id`, `class_name`, `confidence` (4 dp), `bbox` (2 dp)
/// - `count`: number of detections
///
/// # Errors
/// - 400 Bad Request: no `image` field (`{"error": "No image provided"}`),
///   or an unparseable multipart body
/// - 413 Payload Too Large: body over the configured upload limit
/// - 500 Internal Server Error: the upload could not be stored, decoded or
///   run through the model
pub async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    // A body that is not multipart at all carries no image field
    let upload = match multipart {
        Ok(multipart) => extract_image_upload(multipart).await?,
        Err(rejection) => {
            debug!("Request is not multipart: {}", rejection);
            None
        }
    };

    match state.predictions().predict(upload).await {
        Ok(result) => {
            debug!("Detection request {}", RequestStage::Responded);
            Ok(Json(PredictResponse::from(result)))
        }
        Err(e) => {
            warn!("Prediction failed: {}", e);
            Err(ApiError::from(e))
        }
    }
}
