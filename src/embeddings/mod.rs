// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! CLIP embedding generation
//!
//! - `EmbeddingModel`: the model adapter seam (pipelines + feature heads)
//! - `ClipOnnxModel`: ONNX Runtime implementation of the adapter
//! - `EmbeddingService`: request validation, decoding and dispatch

pub mod errors;
pub mod model_source;
pub mod onnx_model;
pub mod service;
pub mod tokenizer;
pub mod validation;

use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array2, Array4};

pub use errors::EmbeddingError;
pub use model_source::{ModelFiles, ModelSource};
pub use onnx_model::ClipOnnxModel;
pub use service::EmbeddingService;
pub use tokenizer::{ClipTokenizer, TokenizedBatch, CLIP_CONTEXT_LENGTH};
pub use validation::validate_model_identity;

/// A loaded multimodal model plus its text and image input pipelines
///
/// Every method is read-only with respect to model parameters. Feature
/// methods return one row per batch element, each of `dimension()` values.
#[cfg_attr(test, mockall::automock)]
pub trait EmbeddingModel: Send + Sync {
    /// Name the model was loaded from
    fn model_name(&self) -> String;

    /// Output dimensionality shared by both feature heads
    fn dimension(&self) -> usize;

    /// Tokenize a batch of texts, padded to the longest element
    fn tokenize(&self, texts: &[String]) -> Result<TokenizedBatch>;

    /// Resize and normalize a batch of images into an NCHW tensor
    fn preprocess(&self, images: &[DynamicImage]) -> Result<Array4<f32>>;

    /// Compute text features, `[batch, dimension]`
    fn text_features(&self, batch: &TokenizedBatch) -> Result<Array2<f32>>;

    /// Compute image features, `[batch, dimension]`
    fn image_features(&self, pixels: &Array4<f32>) -> Result<Array2<f32>>;
}
