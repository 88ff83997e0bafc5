// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir Detection Node

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-object-detection-2025-10-20";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 1;

/// Minor version number
pub const VERSION_MINOR: u32 = 0;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-10-20";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "object-detection",
    "yolo-onnx",
    "multipart-upload",
    "transient-storage",
    "inference-timeout",
    "graceful-shutdown",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir Detection Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
