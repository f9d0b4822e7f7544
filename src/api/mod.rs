// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embed;
pub mod errors;
pub mod http_server;
pub mod pool;
pub mod server;

pub use embed::{
    image_embedding_handler, text_embedding_handler, EmbeddingResponse, ImageEmbeddingRequest,
    ModelIdentity, TextEmbeddingRequest,
};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, AppState, HealthResponse, MAX_BODY_BYTES};
pub use pool::{PoolError, WorkerPool, DEFAULT_WORKERS};
pub use server::{shutdown_signal, InferenceServer, ServerState};
