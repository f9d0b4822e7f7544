// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /v1/embed/text and POST /v1/embed/image handlers
//!
//! Each handler hands the decoded request to the worker pool, where the
//! embedding service runs synchronously, and records the outcome.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::time::Instant;
use tracing::{debug, warn};

use crate::api::embed::{EmbeddingResponse, ImageEmbeddingRequest, TextEmbeddingRequest};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use crate::monitoring::Operation;

/// POST /v1/embed/text handler
///
/// # Request Body
/// ```json
/// { "model": "CLIP_TEXT", "text": "a photo of a cat" }
/// ```
///
/// # Response Body
/// ```json
/// { "embedding": [0.012, -0.034, ...] }
/// ```
pub async fn text_embedding_handler(
    State(state): State<AppState>,
    payload: Result<Json<TextEmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let started = Instant::now();
    let result = async {
        let Json(request) = payload.map_err(ApiError::from)?;
        debug!(model = %request.model, bytes = request.text.len(), "text embedding request");

        let service = state.service.clone();
        let response = state
            .pool
            .run(move || service.text_embedding(request))
            .await??;
        Ok::<_, ApiError>(response)
    }
    .await;

    finish(&state, Operation::Text, started, result)
}

/// POST /v1/embed/image handler
///
/// # Request Body
/// ```json
/// { "model": "CLIP_IMAGE", "image": "<base64 encoded PNG/JPEG/...>" }
/// ```
pub async fn image_embedding_handler(
    State(state): State<AppState>,
    payload: Result<Json<ImageEmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let started = Instant::now();
    let result = async {
        let Json(request) = payload.map_err(ApiError::from)?;
        debug!(model = %request.model, bytes = request.image.len(), "image embedding request");

        let service = state.service.clone();
        let response = state
            .pool
            .run(move || service.image_embedding(request))
            .await??;
        Ok::<_, ApiError>(response)
    }
    .await;

    finish(&state, Operation::Image, started, result)
}

fn finish(
    state: &AppState,
    operation: Operation,
    started: Instant,
    result: Result<EmbeddingResponse, ApiError>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => {
            warn!("{} embedding request failed: {}", operation, e);
            e.error_type()
        }
    };
    state.metrics.observe(operation, outcome, started.elapsed());
    result.map(Json)
}
