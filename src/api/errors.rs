// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::embed::ModelIdentity;
use crate::api::pool::PoolError;
use crate::embeddings::EmbeddingError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    PayloadTooLarge(String),
    UnsupportedMediaType(String),
    InvalidModelIdentity {
        expected: ModelIdentity,
        actual: ModelIdentity,
    },
    MalformedImage(String),
    ComputeFailed(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UnsupportedMediaType(_) => "unsupported_media_type",
            ApiError::InvalidModelIdentity { .. } => "invalid_model_identity",
            ApiError::MalformedImage(_) => "malformed_image",
            ApiError::ComputeFailed(_) => "compute_failed",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::MalformedImage(msg)
            | ApiError::ComputeFailed(msg)
            | ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::InvalidModelIdentity { expected, actual } => {
                format!("Expected model {}, got {}", expected, actual)
            }
        };

        ErrorResponse {
            error_type: self.error_type().to_string(),
            message,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::InvalidModelIdentity { .. }
            | ApiError::MalformedImage(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::UnsupportedMediaType(_) => 415,
            ApiError::ComputeFailed(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::UnsupportedMediaType(msg) => write!(f, "Unsupported media type: {}", msg),
            ApiError::InvalidModelIdentity { expected, actual } => write!(
                f,
                "Invalid model identity: expected {}, got {}",
                expected, actual
            ),
            ApiError::MalformedImage(msg) => write!(f, "Malformed image: {}", msg),
            ApiError::ComputeFailed(msg) => write!(f, "Compute failed: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::InvalidModelIdentity { expected, actual } => {
                ApiError::InvalidModelIdentity { expected, actual }
            }
            EmbeddingError::MalformedImage(msg) => ApiError::MalformedImage(msg),
            EmbeddingError::Compute(e) => ApiError::ComputeFailed(format!("{:#}", e)),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Closed => ApiError::ServiceUnavailable("Server is shutting down".to_string()),
            PoolError::WorkerFailed(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

/// Keeps the rejection's own status for oversized bodies and missing
/// content types; every other undecodable body is an invalid request
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(message),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::UnsupportedMediaType(message),
            _ => ApiError::InvalidRequest(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
