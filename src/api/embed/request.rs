// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Request types for the embedding RPC surface
//!
//! Both requests carry the identity of the model the caller expects to be
//! served by. The identity is only validated, never used for routing: a
//! deployment runs exactly one CLIP model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model a request expects to be served by
///
/// Serialized as `CLIP_TEXT` / `CLIP_IMAGE` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelIdentity {
    /// CLIP text tower
    ClipText,
    /// CLIP vision tower
    ClipImage,
}

impl ModelIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelIdentity::ClipText => "CLIP_TEXT",
            ModelIdentity::ClipImage => "CLIP_IMAGE",
        }
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for POST /v1/embed/text
///
/// # Example
/// ```json
/// {
///   "model": "CLIP_TEXT",
///   "text": "a photo of a cat"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEmbeddingRequest {
    /// Declared model identity (must be CLIP_TEXT)
    pub model: ModelIdentity,

    /// Text to embed
    pub text: String,
}

impl TextEmbeddingRequest {
    /// Creates a request tagged with the text model identity
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            model: ModelIdentity::ClipText,
            text: text.into(),
        }
    }
}

/// Request body for POST /v1/embed/image
///
/// The image is an encoded image file (PNG, JPEG, ...), base64 encoded in
/// JSON.
///
/// # Example
/// ```json
/// {
///   "model": "CLIP_IMAGE",
///   "image": "iVBORw0KGgo..."
/// }
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEmbeddingRequest {
    /// Declared model identity (must be CLIP_IMAGE)
    pub model: ModelIdentity,

    /// Raw encoded image bytes
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
}

impl ImageEmbeddingRequest {
    /// Creates a request tagged with the image model identity
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            model: ModelIdentity::ClipImage,
            image,
        }
    }
}

impl fmt::Debug for ImageEmbeddingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageEmbeddingRequest")
            .field("model", &self.model)
            .field("image_bytes", &self.image.len())
            .finish()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid base64 image: {}", e)))
    }
}
