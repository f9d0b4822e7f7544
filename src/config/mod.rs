// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process configuration
//!
//! Every value can come from a CLI flag or its environment variable; a `.env`
//! file is loaded first when present. Required values are checked in
//! `ServerConfig::resolve` so their absence is reported by variable name.

use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

use crate::api::DEFAULT_WORKERS;

pub const MODEL_NAME_ENV: &str = "FUZZLE_INFERENCE_MODEL_NAME";
pub const PORT_ENV: &str = "FUZZLE_INFERENCE_PORT";

/// Fuzzle CLIP inference server
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "fuzzle-inference")]
#[command(about = "Serves CLIP text and image embeddings", long_about = None)]
pub struct ServerArgs {
    /// HuggingFace repo id or local directory holding the exported model
    #[arg(long, env = "FUZZLE_INFERENCE_MODEL_NAME")]
    pub model_name: Option<String>,

    /// Port to listen on (all interfaces)
    #[arg(long, env = "FUZZLE_INFERENCE_PORT")]
    pub port: Option<String>,

    /// Number of concurrent embedding workers
    #[arg(long, env = "FUZZLE_INFERENCE_WORKERS")]
    pub workers: Option<usize>,

    /// hf-hub cache directory
    #[arg(long, env = "FUZZLE_INFERENCE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// ONNX Runtime intra-op threads per session
    #[arg(long, env = "FUZZLE_INFERENCE_INTRA_THREADS", default_value_t = 1)]
    pub intra_threads: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("worker count must be at least 1")]
    InvalidWorkers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub model_name: String,
    pub port: u16,
    pub workers: usize,
    pub cache_dir: Option<PathBuf>,
    pub intra_threads: usize,
}

impl ServerConfig {
    /// Load `.env`, parse flags and environment, then resolve
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::resolve(ServerArgs::parse())
    }

    pub fn resolve(args: ServerArgs) -> Result<Self, ConfigError> {
        let model_name = non_empty(args.model_name).ok_or(ConfigError::Missing(MODEL_NAME_ENV))?;
        let port = non_empty(args.port).ok_or(ConfigError::Missing(PORT_ENV))?;
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;

        let workers = args.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }

        Ok(Self {
            model_name,
            port,
            workers,
            cache_dir: args.cache_dir,
            intra_threads: args.intra_threads.max(1),
        })
    }

    /// `0.0.0.0:<port>`
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
