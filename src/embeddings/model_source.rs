// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model file resolution
//!
//! The configured model name is either a local directory holding an exported
//! CLIP model, or a HuggingFace repository id fetched through hf-hub.

use anyhow::{Context, Result};
use hf_hub::api::sync::ApiBuilder;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Text tower, relative to the model root
pub const TEXT_MODEL_FILE: &str = "onnx/text_model.onnx";
/// Vision tower, relative to the model root
pub const VISION_MODEL_FILE: &str = "onnx/vision_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

/// Where the model weights come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Directory on disk
    Local(PathBuf),
    /// HuggingFace Hub repository, cached locally by hf-hub
    HuggingFace {
        repo_id: String,
        cache_dir: Option<PathBuf>,
    },
}

/// Resolved on-disk paths of every file the model needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub text_model: PathBuf,
    pub vision_model: PathBuf,
    pub tokenizer: PathBuf,
    /// Absent means CLIP preprocessing defaults
    pub preprocessor_config: Option<PathBuf>,
}

impl ModelSource {
    /// Existing directories are used as-is, anything else is a Hub repo id
    pub fn from_name(name: &str, cache_dir: Option<PathBuf>) -> Self {
        let path = Path::new(name);
        if path.is_dir() {
            ModelSource::Local(path.to_path_buf())
        } else {
            ModelSource::HuggingFace {
                repo_id: name.to_string(),
                cache_dir,
            }
        }
    }

    /// Human-readable model name
    pub fn name(&self) -> String {
        match self {
            ModelSource::Local(dir) => dir.display().to_string(),
            ModelSource::HuggingFace { repo_id, .. } => repo_id.clone(),
        }
    }

    /// Locate (downloading if needed) all model files
    ///
    /// Blocks on network I/O for Hub sources; call from a blocking context.
    pub fn resolve(&self) -> Result<ModelFiles> {
        match self {
            ModelSource::Local(dir) => resolve_local(dir),
            ModelSource::HuggingFace { repo_id, cache_dir } => {
                resolve_hub(repo_id, cache_dir.as_deref())
            }
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn resolve_local(dir: &Path) -> Result<ModelFiles> {
    info!("Resolving model files in {}", dir.display());

    let files = ModelFiles {
        text_model: find_local(dir, TEXT_MODEL_FILE)?,
        vision_model: find_local(dir, VISION_MODEL_FILE)?,
        tokenizer: find_local(dir, TOKENIZER_FILE)?,
        preprocessor_config: find_local(dir, PREPROCESSOR_CONFIG_FILE).ok(),
    };

    if files.preprocessor_config.is_none() {
        warn!(
            "{} not found in {}, using CLIP defaults",
            PREPROCESSOR_CONFIG_FILE,
            dir.display()
        );
    }

    Ok(files)
}

/// Look for `relative` under `dir`, then for its file name directly in `dir`
fn find_local(dir: &Path, relative: &str) -> Result<PathBuf> {
    let nested = dir.join(relative);
    if nested.is_file() {
        return Ok(nested);
    }

    if let Some(file_name) = Path::new(relative).file_name() {
        let flat = dir.join(file_name);
        if flat.is_file() {
            return Ok(flat);
        }
    }

    anyhow::bail!("Required model file not found: {}", nested.display())
}

fn resolve_hub(repo_id: &str, cache_dir: Option<&Path>) -> Result<ModelFiles> {
    info!("Fetching model files for {} from HuggingFace Hub", repo_id);

    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(dir) = cache_dir {
        builder = builder.with_cache_dir(dir.to_path_buf());
    }
    let api = builder
        .build()
        .context("Failed to initialize HuggingFace Hub client")?;
    let repo = api.model(repo_id.to_string());

    let fetch = |file: &str| {
        repo.get(file)
            .with_context(|| format!("Failed to fetch {} from {}", file, repo_id))
    };

    let preprocessor_config = match repo.get(PREPROCESSOR_CONFIG_FILE) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(
                "{} unavailable for {} ({}), using CLIP defaults",
                PREPROCESSOR_CONFIG_FILE, repo_id, e
            );
            None
        }
    };

    Ok(ModelFiles {
        text_model: fetch(TEXT_MODEL_FILE)?,
        vision_model: fetch(VISION_MODEL_FILE)?,
        tokenizer: fetch(TOKENIZER_FILE)?,
        preprocessor_config,
    })
}
