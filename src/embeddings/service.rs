// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding dispatch
//!
//! Validates typed requests, decodes payloads, runs the model as a singleton
//! batch and packages the first feature row. Calls are synchronous and meant
//! to run on a worker thread; the service itself holds no mutable state.

use ndarray::Array2;
use std::sync::Arc;
use tracing::debug;

use super::{validate_model_identity, EmbeddingError, EmbeddingModel};
use crate::api::embed::{EmbeddingResponse, ImageEmbeddingRequest, ModelIdentity, TextEmbeddingRequest};
use crate::vision::decode_image_bytes;

/// Identity served for text requests
pub const TEXT_MODEL: ModelIdentity = ModelIdentity::ClipText;

/// Identity served for image requests
pub const IMAGE_MODEL: ModelIdentity = ModelIdentity::ClipImage;

#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<dyn EmbeddingModel>,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("dimension", &self.model.dimension())
            .finish_non_exhaustive()
    }
}

impl EmbeddingService {
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn EmbeddingModel> {
        &self.model
    }

    /// Length of every embedding this service returns
    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// TextEmbedding operation
    pub fn text_embedding(
        &self,
        request: TextEmbeddingRequest,
    ) -> Result<EmbeddingResponse, EmbeddingError> {
        validate_model_identity(request.model, TEXT_MODEL)?;

        let batch = self
            .model
            .tokenize(std::slice::from_ref(&request.text))
            .map_err(EmbeddingError::Compute)?;
        debug!(tokens = batch.sequence_length(), "text tokenized");

        let features = self
            .model
            .text_features(&batch)
            .map_err(EmbeddingError::Compute)?;

        self.package(features)
    }

    /// ImageEmbedding operation
    pub fn image_embedding(
        &self,
        request: ImageEmbeddingRequest,
    ) -> Result<EmbeddingResponse, EmbeddingError> {
        validate_model_identity(request.model, IMAGE_MODEL)?;

        let (image, info) = decode_image_bytes(&request.image)
            .map_err(|e| EmbeddingError::MalformedImage(e.to_string()))?;
        debug!(
            "Decoded image: {}x{} {:?}, {} bytes",
            info.width, info.height, info.format, info.size_bytes
        );

        let pixels = self
            .model
            .preprocess(std::slice::from_ref(&image))
            .map_err(EmbeddingError::Compute)?;

        let features = self
            .model
            .image_features(&pixels)
            .map_err(EmbeddingError::Compute)?;

        self.package(features)
    }

    /// Take the only row of a singleton feature batch
    fn package(&self, features: Array2<f32>) -> Result<EmbeddingResponse, EmbeddingError> {
        let row = features.rows().into_iter().next().ok_or_else(|| {
            EmbeddingError::Compute(anyhow::anyhow!("Model returned an empty feature batch"))
        })?;

        let expected = self.model.dimension();
        if row.len() != expected {
            return Err(EmbeddingError::Compute(anyhow::anyhow!(
                "Unexpected embedding dimension: {} (expected {})",
                row.len(),
                expected
            )));
        }

        Ok(EmbeddingResponse::new(row.to_vec()))
    }
}
