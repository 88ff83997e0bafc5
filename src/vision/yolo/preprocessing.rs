// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for YOLO detectors (letterbox + NCHW tensor)

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Default square input size of YOLO exports
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Gray value used for letterbox padding
pub const PAD_VALUE: u8 = 114;

/// Preprocess an image for YOLO inference
///
/// Steps:
/// 1. Letterbox into `target_size` x `target_size` (aspect ratio kept, gray padding)
/// 2. Convert to RGB, scale to [0, 1]
/// 3. Lay out as NCHW `[1, 3, S, S]`
pub fn preprocess_for_detection(image: &DynamicImage, target_size: u32) -> (Array4<f32>, PreprocessInfo) {
    let info = PreprocessInfo::new(image, target_size);
    let letterboxed = letterbox(image, &info, target_size);

    let size = target_size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in letterboxed.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, info)
}

/// Resize into a padded square canvas as described by `info`
pub fn letterbox(image: &DynamicImage, info: &PreprocessInfo, target_size: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(target_size, target_size, Rgb([PAD_VALUE; 3]));

    if info.original_width == 0 || info.original_height == 0 {
        return canvas;
    }

    let resized = if (info.scaled_width, info.scaled_height)
        == (info.original_width, info.original_height)
    {
        image.to_rgb8()
    } else {
        image
            .resize_exact(
                info.scaled_width,
                info.scaled_height,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8()
    };

    image::imageops::replace(
        &mut canvas,
        &resized,
        info.offset_x as i64,
        info.offset_y as i64,
    );

    canvas
}

/// Geometry of the letterbox transform, used to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreprocessInfo {
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();
        Self::from_dimensions(orig_w, orig_h, target_size)
    }

    pub fn from_dimensions(orig_w: u32, orig_h: u32, target_size: u32) -> Self {
        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                scaled_width: 0,
                scaled_height: 0,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let scaled_width = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a point from model input space back to source-image pixels,
    /// clamped to the image bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}
