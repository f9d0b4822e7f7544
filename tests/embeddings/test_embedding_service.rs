// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingService tests against a deterministic in-process model
//!
//! Verifies that the service:
//! - Returns exactly one vector of the model dimension per request
//! - Is deterministic for identical inputs
//! - Rejects mismatched model identities before touching the model
//! - Keeps serving after a malformed image
//! - Embeds images with extreme aspect ratios without blowing up memory

use crate::common::{
    encoded_image, png_bytes, test_model, test_service, HashingModel, TEST_DIMENSION,
};
use fuzzle_inference::api::{ImageEmbeddingRequest, ModelIdentity, TextEmbeddingRequest};
use fuzzle_inference::embeddings::{EmbeddingError, EmbeddingService};
use fuzzle_inference::vision::ClipProcessorConfig;
use image::ImageFormat;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn service() -> (EmbeddingService, Arc<HashingModel>) {
    let model = test_model();
    (test_service(model.clone()), model)
}

#[test]
fn test_text_embedding_has_model_dimension() {
    let (service, _) = service();

    let response = service
        .text_embedding(TextEmbeddingRequest::new("a photo of a cat"))
        .unwrap();

    assert_eq!(response.embedding.len(), TEST_DIMENSION);
    assert!(response.embedding.iter().all(|v| v.is_finite()));
}

#[test]
fn test_text_embedding_is_deterministic() {
    let (service, _) = service();

    let first = service
        .text_embedding(TextEmbeddingRequest::new("a photo of a cat"))
        .unwrap();
    let second = service
        .text_embedding(TextEmbeddingRequest::new("a photo of a cat"))
        .unwrap();
    let other = service
        .text_embedding(TextEmbeddingRequest::new("a photo of a dog"))
        .unwrap();

    assert_eq!(first.embedding, second.embedding);
    assert_ne!(first.embedding, other.embedding);
}

#[test]
fn test_empty_text_is_embedded() {
    let (service, _) = service();
    let response = service.text_embedding(TextEmbeddingRequest::new("")).unwrap();
    assert_eq!(response.dimension(), TEST_DIMENSION);
}

#[test]
fn test_image_embedding_has_model_dimension() {
    let (service, _) = service();

    let response = service
        .image_embedding(ImageEmbeddingRequest::new(png_bytes([200, 30, 30])))
        .unwrap();

    assert_eq!(response.embedding.len(), TEST_DIMENSION);
}

#[test]
fn test_image_embedding_accepts_jpeg() {
    let (service, _) = service();
    let jpeg = encoded_image(40, 30, [10, 120, 200], ImageFormat::Jpeg);

    let response = service
        .image_embedding(ImageEmbeddingRequest::new(jpeg))
        .unwrap();
    assert_eq!(response.dimension(), TEST_DIMENSION);
}

#[test]
fn test_extreme_aspect_ratio_image_is_embedded() {
    // Full-size CLIP preprocessing so the shortest edge scales 1 px to 224
    let model = Arc::new(
        HashingModel::new(TEST_DIMENSION).with_processor(ClipProcessorConfig::default()),
    );
    let service = test_service(model.clone());

    for (width, height) in [(1, 20_000), (20_000, 1)] {
        let image = encoded_image(width, height, [90, 90, 90], ImageFormat::Png);
        let response = service
            .image_embedding(ImageEmbeddingRequest::new(image))
            .unwrap();
        assert_eq!(response.embedding.len(), TEST_DIMENSION);
    }
    assert_eq!(model.image_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_image_embedding_is_deterministic() {
    let (service, _) = service();

    let red = png_bytes([200, 30, 30]);
    let first = service
        .image_embedding(ImageEmbeddingRequest::new(red.clone()))
        .unwrap();
    let second = service
        .image_embedding(ImageEmbeddingRequest::new(red))
        .unwrap();
    let blue = service
        .image_embedding(ImageEmbeddingRequest::new(png_bytes([30, 30, 200])))
        .unwrap();

    assert_eq!(first.embedding, second.embedding);
    assert_ne!(first.embedding, blue.embedding);
}

#[test]
fn test_text_request_with_image_identity_is_rejected() {
    let (service, model) = service();

    let request = TextEmbeddingRequest {
        model: ModelIdentity::ClipImage,
        text: "a photo of a cat".to_string(),
    };
    let err = service.text_embedding(request).unwrap_err();

    assert!(matches!(
        err,
        EmbeddingError::InvalidModelIdentity {
            expected: ModelIdentity::ClipText,
            actual: ModelIdentity::ClipImage,
        }
    ));
    assert_eq!(model.model_calls(), 0, "model must not be invoked");
}

#[test]
fn test_image_request_with_text_identity_is_rejected() {
    let (service, model) = service();

    let request = ImageEmbeddingRequest {
        model: ModelIdentity::ClipText,
        image: png_bytes([1, 2, 3]),
    };
    let err = service.image_embedding(request).unwrap_err();

    assert_eq!(err.error_type(), "invalid_model_identity");
    assert_eq!(model.model_calls(), 0);
}

#[test]
fn test_malformed_image_then_valid_request() {
    let (service, model) = service();

    let err = service
        .image_embedding(ImageEmbeddingRequest::new(vec![
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09,
        ]))
        .unwrap_err();
    assert!(matches!(err, EmbeddingError::MalformedImage(_)));
    assert_eq!(model.model_calls(), 0);

    let response = service
        .image_embedding(ImageEmbeddingRequest::new(png_bytes([0, 255, 0])))
        .unwrap();
    assert_eq!(response.dimension(), TEST_DIMENSION);
}

#[test]
fn test_compute_failure_is_local_to_request() {
    let (service, _) = service();

    let err = service
        .text_embedding(TextEmbeddingRequest::new(crate::common::FAILING_TEXT))
        .unwrap_err();
    assert_eq!(err.error_type(), "compute_failed");

    assert!(service
        .text_embedding(TextEmbeddingRequest::new("still works"))
        .is_ok());
}

#[test]
fn test_service_is_shared_across_threads() {
    let (service, model) = service();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                let text = format!("caption number {}", i);
                let embedding = service
                    .text_embedding(TextEmbeddingRequest::new(text.clone()))
                    .unwrap()
                    .embedding;
                (text, embedding)
            })
        })
        .collect();

    for handle in handles {
        let (text, embedding) = handle.join().unwrap();
        let expected = service
            .text_embedding(TextEmbeddingRequest::new(text))
            .unwrap()
            .embedding;
        assert_eq!(embedding, expected);
    }

    assert_eq!(
        model.text_calls.load(Ordering::SeqCst),
        16
    );
}
