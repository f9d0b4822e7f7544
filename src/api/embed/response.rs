// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingResponse type shared by both embedding operations

use serde::{Deserialize, Serialize};

/// Response body for both embedding endpoints
///
/// # Example
/// ```json
/// { "embedding": [0.1, -0.2, ...] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Feature vector; its length is the model's output dimensionality
    pub embedding: Vec<f32>,
}

impl EmbeddingResponse {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self { embedding }
    }

    /// Number of values in the embedding
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

impl From<EmbeddingResponse> for Vec<f32> {
    fn from(value: EmbeddingResponse) -> Self {
        value.embedding
    }
}
