// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod client;
pub mod config;
pub mod embeddings;
pub mod monitoring;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{InferenceServer, ModelIdentity, ServerState, WorkerPool};
pub use client::{ClientError, InferenceClient};
pub use config::{ConfigError, ServerArgs, ServerConfig};
pub use embeddings::{ClipOnnxModel, EmbeddingError, EmbeddingModel, EmbeddingService, ModelSource};
