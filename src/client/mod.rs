// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for the embedding endpoints
//!
//! Builds correctly tagged requests and maps error bodies back into typed
//! errors, so callers never send the wrong model identity.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{
    EmbeddingResponse, ErrorResponse, HealthResponse, ImageEmbeddingRequest, TextEmbeddingRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request rejected ({status}): {error_type}: {message}")]
    Rejected {
        status: u16,
        error_type: String,
        message: String,
    },
}

impl ClientError {
    /// Server-reported error type, if the server answered
    pub fn error_type(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { error_type, .. } => Some(error_type),
            ClientError::Transport(_) => None,
        }
    }
}

/// Client for a running inference server
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    endpoint: String,
}

impl InferenceClient {
    /// Create a client for `endpoint`, e.g. `http://127.0.0.1:50051`
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!("Inference client configured: endpoint={}", endpoint);

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Embed a text with the CLIP text tower
    pub async fn text_embedding(&self, text: &str) -> Result<Vec<f32>, ClientError> {
        let request = TextEmbeddingRequest::new(text);
        self.post("/v1/embed/text", &request).await
    }

    /// Embed an encoded image (PNG, JPEG, ...) with the CLIP vision tower
    pub async fn image_embedding(&self, image: Vec<u8>) -> Result<Vec<f32>, ClientError> {
        let request = ImageEmbeddingRequest::new(image);
        self.post("/v1/embed/image", &request).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<Vec<f32>, ClientError> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let embedding: EmbeddingResponse = response.json().await?;
            debug!("Received embedding of {} values", embedding.dimension());
            return Ok(embedding.into());
        }

        let text = response.text().await.unwrap_or_default();
        let (error_type, message) = match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) => (body.error_type, body.message),
            Err(_) => ("unknown".to_string(), text),
        };

        Err(ClientError::Rejected {
            status: status.as_u16(),
            error_type,
            message,
        })
    }
}
