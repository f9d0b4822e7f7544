// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use fuzzle_inference::{
    api::{shutdown_signal, InferenceServer, WorkerPool},
    config::ServerConfig,
    embeddings::{ClipOnnxModel, EmbeddingModel, EmbeddingService, ModelSource},
    version,
};
use std::{env, process::ExitCode, sync::Arc};
use tracing::{error, info};

fn main() -> ExitCode {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // One blocking thread per worker; the pool never asks for more
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.workers)
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    info!("📦 {}", version::get_version_string());

    let source = ModelSource::from_name(&config.model_name, config.cache_dir.clone());
    info!("🧠 Loading CLIP model from {}", source);

    let intra_threads = config.intra_threads;
    let model = tokio::task::spawn_blocking(move || ClipOnnxModel::load(&source, intra_threads))
        .await
        .context("Model loading task failed")??;
    info!(
        "✅ Model {} loaded ({} dimensions)",
        model.model_name(),
        model.dimension()
    );

    let service = EmbeddingService::new(Arc::new(model));
    let pool = WorkerPool::new(config.workers);
    info!("Worker pool ready with {} workers", pool.size());

    let server = InferenceServer::bind(config.listen_addr(), service, pool).await?;
    server.serve(shutdown_signal()).await
}
