// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX CLIP Model Wrapper
//!
//! Runs the two towers of an exported CLIP model with ONNX Runtime:
//! - `text_model.onnx`: token ids (+ attention mask) -> projected text features
//! - `vision_model.onnx`: pixel values -> projected image features
//!
//! Both towers project into the same space, so both heads must report the
//! same output dimension (512 for ViT-B/32, 768 for ViT-L/14).

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ndarray::{Array2, Array4, ArrayViewD, Ix2};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::model_source::ModelSource;
use super::tokenizer::{ClipTokenizer, TokenizedBatch, CLIP_CONTEXT_LENGTH};
use super::EmbeddingModel;
use crate::vision::preprocessing::{preprocess_batch, ClipProcessorConfig};

const INPUT_IDS: &str = "input_ids";
const ATTENTION_MASK: &str = "attention_mask";
const TEXT_EMBEDS: &str = "text_embeds";
const IMAGE_EMBEDS: &str = "image_embeds";

/// ONNX-based CLIP model
///
/// # Thread Safety
/// ONNX Runtime sessions need exclusive access to run, so each tower sits
/// behind its own mutex. Tokenization and image preprocessing happen outside
/// the locks.
pub struct ClipOnnxModel {
    /// Text tower session
    text_session: Mutex<Session>,

    /// Vision tower session
    vision_session: Mutex<Session>,

    /// Whether the text tower declares an attention_mask input
    text_uses_attention_mask: bool,

    /// Output index holding projected text features
    text_output: usize,

    /// Name of the vision tower's pixel input
    vision_input: String,

    /// Output index holding projected image features
    vision_output: usize,

    tokenizer: ClipTokenizer,

    processor: ClipProcessorConfig,

    /// Model name (e.g., "Xenova/clip-vit-base-patch32")
    model_name: String,

    /// Output dimension, probed at load time
    dimension: usize,
}

impl std::fmt::Debug for ClipOnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipOnnxModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("text_uses_attention_mask", &self.text_uses_attention_mask)
            .field("vision_input", &self.vision_input)
            .finish_non_exhaustive()
    }
}

impl ClipOnnxModel {
    /// Loads both towers and both pipelines
    ///
    /// # Arguments
    /// - `source`: Where to find the model files
    /// - `intra_threads`: ONNX Runtime intra-op threads per session
    ///
    /// # Errors
    /// Returns error if:
    /// - A required model file cannot be found or downloaded
    /// - ONNX Runtime cannot load either tower
    /// - The tokenizer or preprocessor config is invalid
    /// - The probe inference fails or the towers disagree on dimension
    ///
    /// Blocking: downloads files and runs two probe inferences.
    pub fn load(source: &ModelSource, intra_threads: usize) -> Result<Self> {
        let files = source.resolve()?;
        info!("🚀 Loading CLIP model {}", source);

        let text_session = build_session(&files.text_model, intra_threads)?;
        let vision_session = build_session(&files.vision_model, intra_threads)?;

        let tokenizer = ClipTokenizer::from_file(&files.tokenizer, CLIP_CONTEXT_LENGTH)?;
        let processor = match &files.preprocessor_config {
            Some(path) => ClipProcessorConfig::from_file(path)?,
            None => ClipProcessorConfig::default(),
        };

        if !text_session.inputs.iter().any(|input| input.name == INPUT_IDS) {
            anyhow::bail!("Text model has no '{}' input", INPUT_IDS);
        }
        let text_uses_attention_mask = text_session
            .inputs
            .iter()
            .any(|input| input.name == ATTENTION_MASK);
        let text_output = output_index(&text_session, TEXT_EMBEDS);

        let vision_input = vision_session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());
        let vision_output = output_index(&vision_session, IMAGE_EMBEDS);

        debug!(
            text_uses_attention_mask,
            text_output, vision_input, vision_output, "CLIP session layout"
        );

        let mut model = Self {
            text_session: Mutex::new(text_session),
            vision_session: Mutex::new(vision_session),
            text_uses_attention_mask,
            text_output,
            vision_input,
            vision_output,
            tokenizer,
            processor,
            model_name: source.name(),
            dimension: 0,
        };

        // Probe both towers to learn the output dimension
        let probe_text = model.tokenizer.encode_batch(&["a photo".to_string()])?;
        let text_dim = model
            .text_features(&probe_text)
            .context("Text model probe failed")?
            .ncols();

        let (width, height) = model.processor.output_size();
        let probe_pixels = Array4::zeros((1, 3, height as usize, width as usize));
        let image_dim = model
            .image_features(&probe_pixels)
            .context("Vision model probe failed")?
            .ncols();

        if text_dim == 0 || text_dim != image_dim {
            anyhow::bail!(
                "Text and vision towers disagree on embedding dimension: {} vs {}",
                text_dim,
                image_dim
            );
        }
        model.dimension = text_dim;

        info!(
            "✅ CLIP model {} loaded ({} dimensions)",
            model.model_name, model.dimension
        );

        Ok(model)
    }

    pub fn processor(&self) -> &ClipProcessorConfig {
        &self.processor
    }
}

impl EmbeddingModel for ClipOnnxModel {
    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn tokenize(&self, texts: &[String]) -> Result<TokenizedBatch> {
        self.tokenizer.encode_batch(texts)
    }

    fn preprocess(&self, images: &[DynamicImage]) -> Result<Array4<f32>> {
        Ok(preprocess_batch(images, &self.processor))
    }

    fn text_features(&self, batch: &TokenizedBatch) -> Result<Array2<f32>> {
        let input_ids = Value::from_array(batch.input_ids.clone())
            .context("Failed to create input_ids tensor")?;

        let mut session = lock_session(&self.text_session);

        let result = if self.text_uses_attention_mask {
            let attention_mask = Value::from_array(batch.attention_mask.clone())
                .context("Failed to create attention_mask tensor")?;
            session.run(ort::inputs![
                INPUT_IDS => input_ids,
                ATTENTION_MASK => attention_mask
            ])
        } else {
            session.run(ort::inputs![INPUT_IDS => input_ids])
        };
        let outputs = result.context("Text model inference failed")?;

        let features = outputs[self.text_output]
            .try_extract_array::<f32>()
            .context("Failed to extract text features")?;
        to_feature_matrix(features)
    }

    fn image_features(&self, pixels: &Array4<f32>) -> Result<Array2<f32>> {
        let shape = pixels.shape();
        if shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [N, 3, H, W]", shape);
        }

        let pixel_values =
            Value::from_array(pixels.to_owned()).context("Failed to create pixel tensor")?;

        let mut session = lock_session(&self.vision_session);

        let outputs = session
            .run(ort::inputs![&self.vision_input => pixel_values])
            .context("Vision model inference failed")?;

        let features = outputs[self.vision_output]
            .try_extract_array::<f32>()
            .context("Failed to extract image features")?;
        to_feature_matrix(features)
    }
}

/// Build a session, trying CUDA first and falling back to CPU
fn build_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model file not found: {}", model_path.display());
    }

    let cuda_result = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .context("Failed to set CUDA execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path);

    match cuda_result {
        Ok(session) => Ok(session),
        Err(e) => {
            warn!("⚠️  CUDA execution provider failed: {}", e);
            warn!("   Falling back to CPU execution provider");
            Session::builder()
                .context("Failed to create session builder")?
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .context("Failed to set CPU execution provider")?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")?
                .with_intra_threads(intra_threads)
                .context("Failed to set intra threads")?
                .commit_from_file(model_path)
                .with_context(|| {
                    format!("Failed to load ONNX model from {}", model_path.display())
                })
        }
    }
}

/// Index of the named output, or 0 when the export uses other names
fn output_index(session: &Session, name: &str) -> usize {
    session
        .outputs
        .iter()
        .position(|output| output.name == name)
        .unwrap_or(0)
}

/// Features must come out as `[batch, dim]`
fn to_feature_matrix(features: ArrayViewD<'_, f32>) -> Result<Array2<f32>> {
    let shape = features.shape().to_vec();
    let matrix = features
        .into_dimensionality::<Ix2>()
        .map_err(|_| anyhow!("Unexpected feature shape {:?} (expected [batch, dim])", shape))?;
    Ok(matrix.to_owned())
}

/// Lock a session, recovering from poisoning; a panicked run leaves the
/// session reusable
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
