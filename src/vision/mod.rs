// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image input pipeline
//!
//! - Decoding of request payloads into pixels
//! - CLIP preprocessing (resize, center crop, rescale, normalize)

pub mod image_utils;
pub mod preprocessing;

pub use image_utils::{decode_image_bytes, ImageError, ImageInfo};
pub use preprocessing::{preprocess_batch, ClipProcessorConfig, CropSpec, ResizeSpec};
