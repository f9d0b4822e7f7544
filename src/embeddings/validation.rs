// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model identity validation

use super::EmbeddingError;
use crate::api::embed::ModelIdentity;

/// Confirm a request declares the identity this deployment serves
///
/// Passes silently on equality; a mismatch is a client contract violation,
/// returned as `InvalidModelIdentity`.
pub fn validate_model_identity(
    declared: ModelIdentity,
    expected: ModelIdentity,
) -> Result<(), EmbeddingError> {
    if declared == expected {
        Ok(())
    } else {
        Err(EmbeddingError::InvalidModelIdentity {
            expected,
            actual: declared,
        })
    }
}
