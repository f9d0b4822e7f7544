// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! POST /v1/embed/text and POST /v1/embed/image, each returning one CLIP
//! embedding per request.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{image_embedding_handler, text_embedding_handler};
pub use request::{ImageEmbeddingRequest, ModelIdentity, TextEmbeddingRequest};
pub use response::EmbeddingResponse;
