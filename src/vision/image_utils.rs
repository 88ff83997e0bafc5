// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reading and decoding uploaded images from their backing files

use image::{DynamicImage, ImageFormat};
use std::path::Path;
use thiserror::Error;

/// Default upper bound on an uploaded image (10MB)
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Failed to read image file {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Metadata of a decoded image
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size_bytes: usize,
}

/// Read the raw bytes of an image file, enforcing the size limit
///
/// Used by the detector to load the backing file of an upload. Decoding is
/// left to the caller so it can run off the async executor.
pub async fn read_image_file(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ImageError> {
    let unreadable = |e: std::io::Error| ImageError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let len = tokio::fs::metadata(path).await.map_err(unreadable)?.len();
    if len > max_bytes as u64 {
        return Err(ImageError::TooLarge(len as usize, max_bytes));
    }

    tokio::fs::read(path).await.map_err(unreadable)
}

/// Decode raw image bytes
///
/// The format is sniffed from magic bytes, never from the (client supplied)
/// file name. CPU bound; call from a blocking context for large inputs.
pub fn decode_image_bytes(
    bytes: &[u8],
    max_bytes: usize,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF87a / GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}
