// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Transient storage for uploaded images
//!
//! Every upload is written to its own file under the upload directory, named
//! `<uuid>_<sanitized client filename>`. The random id keeps concurrent
//! requests from ever sharing a backing file. The file lives exactly as long
//! as the request: `release` removes it, and dropping an unreleased
//! `UploadedImage` removes it as a last resort (e.g. when the client goes
//! away mid-request and the handler future is dropped).

use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::DetectionError;

/// Maximum length kept from the client supplied file name
const MAX_FILE_NAME_LEN: usize = 100;

/// Name used when the client sent no usable file name
const FALLBACK_FILE_NAME: &str = "upload";

/// Inbound image payload, as received from the client
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// File name supplied by the client (untrusted)
    pub file_name: Option<String>,
    /// Raw bytes of the upload
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name,
            bytes: bytes.into(),
        }
    }
}

/// An upload placed on backing storage for the duration of one request
#[derive(Debug)]
pub struct UploadedImage {
    id: Uuid,
    backing_path: PathBuf,
    size_bytes: usize,
    released: bool,
}

impl UploadedImage {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backing_path(&self) -> &Path {
        &self.backing_path
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for UploadedImage {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            "Upload {} dropped without release, removing {}",
            self.id,
            self.backing_path.display()
        );
        match std::fs::remove_file(&self.backing_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.backing_path.display(), e),
        }
    }
}

/// Places uploads on disk and guarantees their removal
#[derive(Debug, Clone)]
pub struct TransientStore {
    upload_dir: PathBuf,
}

impl TransientStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Create the upload directory if it does not exist yet
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await
    }

    /// Write the payload to a fresh, uniquely named backing file
    ///
    /// # Errors
    /// - `InvalidPayload` when no payload (or an empty one) was supplied;
    ///   nothing is written in that case
    /// - `Inference` when the backing file cannot be written
    pub async fn store(&self, payload: Option<ImageUpload>) -> Result<UploadedImage, DetectionError> {
        let payload = match payload {
            Some(p) if !p.bytes.is_empty() => p,
            _ => return Err(DetectionError::InvalidPayload),
        };

        let id = Uuid::new_v4();
        let file_name = format!(
            "{}_{}",
            id,
            sanitize_file_name(payload.file_name.as_deref().unwrap_or(FALLBACK_FILE_NAME))
        );
        let backing_path = self.upload_dir.join(file_name);

        // create_new: an id collision must fail instead of clobbering another upload
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&backing_path)
            .await
            .map_err(|e| {
                DetectionError::inference(format!(
                    "Failed to store upload at {}: {}",
                    backing_path.display(),
                    e
                ))
            })?;

        // From here on the guard owns the file and removes it on any early return
        let mut image = UploadedImage {
            id,
            backing_path,
            size_bytes: payload.bytes.len(),
            released: false,
        };

        let written = async {
            file.write_all(&payload.bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            let message = format!(
                "Failed to store upload at {}: {}",
                image.backing_path.display(),
                e
            );
            drop(file);
            self.release(&mut image).await;
            return Err(DetectionError::inference(message));
        }

        debug!(
            "Stored upload {} ({} bytes) at {}",
            image.id,
            image.size_bytes,
            image.backing_path.display()
        );

        Ok(image)
    }

    /// Remove the backing file of an upload
    ///
    /// Idempotent: a second call, or a file that is already gone, is a no-op.
    /// Never fails; unexpected I/O errors are logged and the upload stays
    /// unreleased, so a later call or the drop guard tries again.
    pub async fn release(&self, image: &mut UploadedImage) {
        if image.released {
            return;
        }

        match tokio::fs::remove_file(&image.backing_path).await {
            Ok(()) => {
                debug!("Released upload {}", image.id);
                image.released = true;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Upload {} was already removed", image.id);
                image.released = true;
            }
            Err(e) => warn!(
                "Failed to remove backing file {}: {}",
                image.backing_path.display(),
                e
            ),
        }
    }
}

/// Reduce a client supplied file name to a safe, single path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
