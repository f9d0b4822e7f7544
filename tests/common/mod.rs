// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures for integration tests
//!
//! `HashingModel` stands in for real CLIP weights: features are a
//! deterministic function of the token ids / pixels, so equal inputs give
//! bit-identical embeddings and distinct inputs give distinct ones.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use fuzzle_inference::api::{AppState, WorkerPool};
use fuzzle_inference::embeddings::{EmbeddingModel, EmbeddingService, TokenizedBatch};
use fuzzle_inference::monitoring::InferenceMetrics;
use fuzzle_inference::vision::{preprocess_batch, ClipProcessorConfig, CropSpec, ResizeSpec};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, Array4, Axis};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_DIMENSION: usize = 512;

/// Text that makes the fake tokenizer fail
pub const FAILING_TEXT: &str = "<fail>";

pub struct HashingModel {
    dimension: usize,
    processor: ClipProcessorConfig,
    pub tokenize_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    /// Feature computations that ran to completion
    pub completed: AtomicUsize,
    delay: Option<Duration>,
}

impl HashingModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            processor: ClipProcessorConfig {
                size: ResizeSpec::Edge(8),
                crop_size: CropSpec::Square(8),
                ..Default::default()
            },
            tokenize_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Use a real preprocessing config instead of the tiny default
    pub fn with_processor(mut self, processor: ClipProcessorConfig) -> Self {
        self.processor = processor;
        self
    }

    /// Make every feature computation take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn simulate_work(&self) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
    }

    pub fn model_calls(&self) -> usize {
        self.tokenize_calls.load(Ordering::SeqCst)
            + self.text_calls.load(Ordering::SeqCst)
            + self.image_calls.load(Ordering::SeqCst)
    }

    fn features(&self, seed: u64) -> Vec<f32> {
        // LCG seeded from the input hash
        let mut state = seed;
        (0..self.dimension)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

fn fnv1a(values: impl Iterator<Item = u64>) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for value in values {
        for byte in value.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

impl EmbeddingModel for HashingModel {
    fn model_name(&self) -> String {
        "hashing-clip".to_string()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn tokenize(&self, texts: &[String]) -> Result<TokenizedBatch> {
        self.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| t == FAILING_TEXT) {
            return Err(anyhow!("Tokenization failed"));
        }

        let longest = texts.iter().map(|t| t.len()).max().unwrap_or(0) + 2;
        let mut input_ids = Array2::zeros((texts.len(), longest));
        let mut attention_mask = Array2::zeros((texts.len(), longest));
        for (row, text) in texts.iter().enumerate() {
            let ids = std::iter::once(49406i64)
                .chain(text.bytes().map(i64::from))
                .chain(std::iter::once(49407));
            for (col, id) in ids.enumerate() {
                input_ids[[row, col]] = id;
                attention_mask[[row, col]] = 1;
            }
        }
        Ok(TokenizedBatch {
            input_ids,
            attention_mask,
        })
    }

    fn preprocess(&self, images: &[DynamicImage]) -> Result<Array4<f32>> {
        Ok(preprocess_batch(images, &self.processor))
    }

    fn text_features(&self, batch: &TokenizedBatch) -> Result<Array2<f32>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<Vec<f32>> = batch
            .input_ids
            .axis_iter(Axis(0))
            .map(|ids| self.features(fnv1a(ids.iter().map(|&id| id as u64))))
            .collect();
        self.simulate_work();
        self.completed.fetch_add(1, Ordering::SeqCst);
        to_matrix(rows, self.dimension)
    }

    fn image_features(&self, pixels: &Array4<f32>) -> Result<Array2<f32>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<Vec<f32>> = pixels
            .axis_iter(Axis(0))
            .map(|image| self.features(fnv1a(image.iter().map(|v| v.to_bits() as u64))))
            .collect();
        self.simulate_work();
        self.completed.fetch_add(1, Ordering::SeqCst);
        to_matrix(rows, self.dimension)
    }
}

fn to_matrix(rows: Vec<Vec<f32>>, dimension: usize) -> Result<Array2<f32>> {
    let n = rows.len();
    Ok(Array2::from_shape_vec(
        (n, dimension),
        rows.into_iter().flatten().collect(),
    )?)
}

pub fn test_model() -> Arc<HashingModel> {
    Arc::new(HashingModel::new(TEST_DIMENSION))
}

pub fn test_service(model: Arc<HashingModel>) -> EmbeddingService {
    EmbeddingService::new(model)
}

pub fn test_state(model: Arc<HashingModel>, workers: usize) -> AppState {
    AppState::new(
        test_service(model),
        WorkerPool::new(workers),
        Arc::new(InferenceMetrics::new().expect("metrics")),
    )
}

/// Encode a solid-color image
pub fn encoded_image(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode image");
    buf.into_inner()
}

pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    encoded_image(32, 24, color, ImageFormat::Png)
}

/// A server running on an ephemeral localhost port
pub struct RunningServer {
    pub addr: std::net::SocketAddr,
    pub model: Arc<HashingModel>,
    pub state: tokio::sync::watch::Receiver<fuzzle_inference::api::ServerState>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<anyhow::Result<()>>>,
}

impl RunningServer {
    pub async fn start(workers: usize) -> Self {
        Self::start_with_model(test_model(), workers).await
    }

    pub async fn start_with_model(model: Arc<HashingModel>, workers: usize) -> Self {
        use fuzzle_inference::api::{InferenceServer, ServerState};

        let server = InferenceServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            test_service(model.clone()),
            WorkerPool::new(workers),
        )
        .await
        .expect("bind");

        let addr = server.local_addr();
        let mut state = server.state();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));

        state
            .wait_for(|s| *s == ServerState::Serving)
            .await
            .expect("server state");

        Self {
            addr,
            model,
            state,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Trigger graceful shutdown and wait for `serve` to return
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await?,
            None => Ok(()),
        }
    }
}
