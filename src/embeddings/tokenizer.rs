// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text pipeline for the CLIP text tower

use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Maximum sequence length of the CLIP text tower
pub const CLIP_CONTEXT_LENGTH: usize = 77;

/// Token used for padding when tokenizer.json does not configure one
const CLIP_PAD_TOKEN: &str = "<|endoftext|>";

/// Tokenized batch ready to be fed to the text tower
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedBatch {
    /// Token ids, `[batch, seq_len]`
    pub input_ids: Array2<i64>,
    /// 1 for real tokens, 0 for padding, `[batch, seq_len]`
    pub attention_mask: Array2<i64>,
}

impl TokenizedBatch {
    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn sequence_length(&self) -> usize {
        self.input_ids.ncols()
    }
}

/// HuggingFace tokenizer configured for CLIP batching
///
/// Pads to the longest element of each batch and truncates to the context
/// length of the model.
#[derive(Debug, Clone)]
pub struct ClipTokenizer {
    tokenizer: Tokenizer,
    context_length: usize,
}

impl ClipTokenizer {
    /// Load tokenizer.json from disk
    pub fn from_file<P: AsRef<Path>>(path: P, context_length: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", path.display());
        }
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        Self::new(tokenizer, context_length)
    }

    /// Wrap an already-built tokenizer, forcing batch padding and truncation
    pub fn new(mut tokenizer: Tokenizer, context_length: usize) -> Result<Self> {
        let padding = match tokenizer.get_padding() {
            Some(existing) => PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                ..existing.clone()
            },
            None => {
                let pad_id = tokenizer.token_to_id(CLIP_PAD_TOKEN).unwrap_or(0);
                PaddingParams {
                    strategy: PaddingStrategy::BatchLongest,
                    pad_id,
                    pad_token: CLIP_PAD_TOKEN.to_string(),
                    ..Default::default()
                }
            }
        };
        tokenizer.with_padding(Some(padding));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: context_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        Ok(Self {
            tokenizer,
            context_length,
        })
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    /// Tokenize a batch of texts into `[batch, seq_len]` id and mask arrays
    pub fn encode_batch(&self, texts: &[String]) -> Result<TokenizedBatch> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
        let mut input_ids = Vec::with_capacity(encodings.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(encodings.len() * seq_len);

        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = (encodings.len(), seq_len);
        Ok(TokenizedBatch {
            input_ids: Array2::from_shape_vec(shape, input_ids)
                .context("Failed to create input_ids array")?,
            attention_mask: Array2::from_shape_vec(shape, attention_mask)
                .context("Failed to create attention_mask array")?,
        })
    }
}
