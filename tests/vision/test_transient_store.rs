// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Transient Store tests
//!
//! These tests verify that:
//! - Every upload gets its own backing file, even with identical names
//! - Client file names can never escape the upload directory
//! - Release is idempotent and dropping an unreleased upload cleans up

use fabstir_detection_node::vision::{DetectionError, ImageUpload, TransientStore};

#[tokio::test]
async fn test_identical_names_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());

    let mut first = store
        .store(Some(ImageUpload::new(Some("photo.jpg".into()), b"one".to_vec())))
        .await
        .unwrap();
    let mut second = store
        .store(Some(ImageUpload::new(Some("photo.jpg".into()), b"two".to_vec())))
        .await
        .unwrap();

    assert_ne!(first.id(), second.id());
    assert_ne!(first.backing_path(), second.backing_path());
    assert_eq!(std::fs::read(first.backing_path()).unwrap(), b"one");
    assert_eq!(std::fs::read(second.backing_path()).unwrap(), b"two");

    store.release(&mut first).await;
    assert!(!first.backing_path().exists());
    assert!(second.backing_path().exists());

    store.release(&mut second).await;
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_backing_file_stays_inside_upload_dir() {
    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());

    let mut image = store
        .store(Some(ImageUpload::new(
            Some("../../etc/passwd".into()),
            b"data".to_vec(),
        )))
        .await
        .unwrap();

    assert_eq!(image.backing_path().parent(), Some(dir.path()));
    let name = image.backing_path().file_name().unwrap().to_string_lossy();
    assert!(name.starts_with(&image.id().to_string()));
    assert!(name.ends_with("_passwd"));

    store.release(&mut image).await;
}

#[tokio::test]
async fn test_release_twice_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());

    let mut image = store
        .store(Some(ImageUpload::new(None, b"bytes".to_vec())))
        .await
        .unwrap();
    assert_eq!(image.size_bytes(), 5);

    store.release(&mut image).await;
    assert!(image.is_released());
    store.release(&mut image).await;
    assert!(image.is_released());
}

#[tokio::test]
async fn test_release_after_external_removal() {
    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());

    let mut image = store
        .store(Some(ImageUpload::new(Some("a.png".into()), b"x".to_vec())))
        .await
        .unwrap();
    std::fs::remove_file(image.backing_path()).unwrap();

    store.release(&mut image).await;
    assert!(image.is_released());
}

#[tokio::test]
async fn test_dropping_unreleased_upload_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());

    let image = store
        .store(Some(ImageUpload::new(Some("a.png".into()), b"x".to_vec())))
        .await
        .unwrap();
    let path = image.backing_path().to_path_buf();
    assert!(path.exists());

    drop(image);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_missing_payload_allocates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());

    assert!(matches!(
        store.store(None).await,
        Err(DetectionError::InvalidPayload)
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_prepare_creates_upload_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested").join("uploads");
    let store = TransientStore::new(&nested);

    let err = store
        .store(Some(ImageUpload::new(None, b"x".to_vec())))
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::Inference(_)));

    store.prepare().await.unwrap();
    assert!(nested.is_dir());

    let mut image = store
        .store(Some(ImageUpload::new(None, b"x".to_vec())))
        .await
        .unwrap();
    store.release(&mut image).await;
}
