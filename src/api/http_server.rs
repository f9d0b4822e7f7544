// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use super::embed::{image_embedding_handler, text_embedding_handler};
use super::pool::WorkerPool;
use crate::embeddings::EmbeddingService;
use crate::monitoring::InferenceMetrics;
use crate::version;

/// Largest accepted request body; base64 images inflate by a third
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: EmbeddingService,
    pub pool: WorkerPool,
    pub metrics: Arc<InferenceMetrics>,
}

impl AppState {
    pub fn new(service: EmbeddingService, pool: WorkerPool, metrics: Arc<InferenceMetrics>) -> Self {
        Self {
            service,
            pool,
            metrics,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub dimension: usize,
    pub workers: usize,
    pub version: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/embed/text", post(text_embedding_handler))
        .route("/v1/embed/image", post(image_embedding_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.pool.is_closed() {
        "stopping"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        model: state.service.model().model_name(),
        dimension: state.service.dimension(),
        workers: state.pool.size(),
        version: version::VERSION_NUMBER.to_string(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
