// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use fabstir_detection_node::{
    api::{start_server, AppState},
    cli::Cli,
    config::ServiceConfig,
    version,
    vision::{Detector, ModelHandle, PredictionService, TransientStore},
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so both clap env fallbacks and RUST_LOG see it
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting {}...\n", version::get_version_string());
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("🧩 Features: {}", version::FEATURES.join(", "));
    println!();

    let config = ServiceConfig::from(Cli::parse());
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let addr = config
        .listen_addr()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let store = TransientStore::new(&config.upload_dir);
    store.prepare().await.with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_dir.display()
        )
    })?;
    println!("📁 Upload directory: {}", config.upload_dir.display());

    // The service cannot serve without its model
    println!("🧠 Loading detection model...");
    let model = ModelHandle::load_yolo(config.yolo_config()).await?;
    println!(
        "✅ Detection model ready: {} ({} classes, backend {})",
        model.artifact(),
        model.labels().len(),
        model.backend_name()
    );

    let detector = Detector::new(Arc::new(model))
        .with_timeout(config.inference_timeout())
        .with_max_image_bytes(config.max_upload_bytes);
    let predictions = PredictionService::new(store, detector);
    let state = AppState::new(Arc::new(predictions));

    println!("\n🎉 Fabstir Detection Node is running!");
    println!("========================================");
    println!("Health:   http://{}/health", addr);
    println!("Predict:  http://{}/predict", addr);
    println!("========================================");
    println!("\nPress Ctrl+C to shutdown...\n");

    start_server(addr, state, config.max_upload_bytes).await?;

    println!("✅ Shutdown complete");
    Ok(())
}
