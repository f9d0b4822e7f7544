// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Per-request embedding errors

use crate::api::embed::ModelIdentity;
use thiserror::Error;

/// Failure of a single embedding request
///
/// None of these affect other requests; the model is never mutated.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The request asked for a model this deployment does not run
    #[error("invalid model identity: expected {expected}, got {actual}")]
    InvalidModelIdentity {
        expected: ModelIdentity,
        actual: ModelIdentity,
    },

    /// The image payload could not be decoded
    #[error("malformed image: {0}")]
    MalformedImage(String),

    /// Tokenization, preprocessing or inference failed
    #[error("embedding computation failed: {0:#}")]
    Compute(anyhow::Error),
}

impl EmbeddingError {
    /// Stable machine-readable error type
    pub fn error_type(&self) -> &'static str {
        match self {
            EmbeddingError::InvalidModelIdentity { .. } => "invalid_model_identity",
            EmbeddingError::MalformedImage(_) => "malformed_image",
            EmbeddingError::Compute(_) => "compute_failed",
        }
    }
}
