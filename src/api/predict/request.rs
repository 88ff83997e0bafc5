// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction request parsing

use axum_extra::extract::Multipart;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::ImageUpload;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Pull the `image` field out of a multipart body
///
/// Returns `Ok(None)` when the form has no `image` field. Other fields are
/// drained and ignored. If `image` appears more than once the first one wins.
pub async fn extract_image_upload(
    mut multipart: Multipart,
) -> Result<Option<ImageUpload>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name != IMAGE_FIELD || upload.is_some() {
            debug!("Skipping multipart field '{}'", name);
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        debug!(
            "Received image field: file_name={:?}, {} bytes",
            file_name,
            bytes.len()
        );
        upload = Some(ImageUpload::new(file_name, bytes));
    }

    Ok(upload)
}
