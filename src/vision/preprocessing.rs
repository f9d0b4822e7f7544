// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the CLIP vision tower
//!
//! Mirrors the HuggingFace `CLIPImageProcessor`: resize the shortest edge,
//! center crop, rescale to [0, 1], normalize per channel, emit NCHW.

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;
use serde::Deserialize;
use std::path::Path;

/// CLIP normalization mean values
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std values
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Default input resolution of CLIP ViT-B models
pub const CLIP_INPUT_SIZE: u32 = 224;

/// `size` in preprocessor_config.json: either a bare int or `{"shortest_edge": n}`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResizeSpec {
    Edge(u32),
    ShortestEdge { shortest_edge: u32 },
}

impl ResizeSpec {
    pub fn shortest_edge(&self) -> u32 {
        match *self {
            ResizeSpec::Edge(n) => n,
            ResizeSpec::ShortestEdge { shortest_edge } => shortest_edge,
        }
    }
}

/// `crop_size` in preprocessor_config.json: either a bare int or `{"height", "width"}`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CropSpec {
    Square(u32),
    Rect { height: u32, width: u32 },
}

impl CropSpec {
    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            CropSpec::Square(n) => (n, n),
            CropSpec::Rect { height, width } => (width, height),
        }
    }
}

/// Subset of preprocessor_config.json used by the CLIP image processor
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClipProcessorConfig {
    pub do_resize: bool,
    pub size: ResizeSpec,
    pub do_center_crop: bool,
    pub crop_size: CropSpec,
    pub do_rescale: bool,
    pub rescale_factor: f32,
    pub do_normalize: bool,
    pub image_mean: [f32; 3],
    pub image_std: [f32; 3],
}

impl Default for ClipProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: ResizeSpec::ShortestEdge {
                shortest_edge: CLIP_INPUT_SIZE,
            },
            do_center_crop: true,
            crop_size: CropSpec::Square(CLIP_INPUT_SIZE),
            do_rescale: true,
            rescale_factor: 1.0 / 255.0,
            do_normalize: true,
            image_mean: CLIP_MEAN,
            image_std: CLIP_STD,
        }
    }
}

impl ClipProcessorConfig {
    /// Load from a preprocessor_config.json file, falling back to CLIP
    /// defaults for any key the file omits
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Spatial size (width, height) of the tensors this config produces
    pub fn output_size(&self) -> (u32, u32) {
        if self.do_center_crop {
            self.crop_size.dimensions()
        } else {
            let edge = self.size.shortest_edge();
            (edge, edge)
        }
    }
}

/// Preprocess a batch of images into an NCHW tensor [N, 3, H, W]
pub fn preprocess_batch(images: &[DynamicImage], config: &ClipProcessorConfig) -> Array4<f32> {
    let (width, height) = config.output_size();
    let (width, height) = (width as usize, height as usize);
    let mut tensor = Array4::zeros((images.len(), 3, height, width));

    for (n, image) in images.iter().enumerate() {
        let rgb = prepare_rgb(image, config);

        for y in 0..height {
            for x in 0..width {
                let pixel = rgb.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    let mut value = pixel[c] as f32;
                    if config.do_rescale {
                        value *= config.rescale_factor;
                    }
                    if config.do_normalize {
                        value = (value - config.image_mean[c]) / config.image_std[c];
                    }
                    tensor[[n, c, y, x]] = value;
                }
            }
        }
    }

    tensor
}

/// Resize and crop an image to exactly the configured output size
///
/// No intermediate buffer is ever larger than the output: the crop window is
/// cut from the source before resizing, so extreme aspect ratios stay cheap.
fn prepare_rgb(image: &DynamicImage, config: &ClipProcessorConfig) -> RgbImage {
    let (out_w, out_h) = config.output_size();
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return RgbImage::new(out_w, out_h);
    }

    match (config.do_resize, config.do_center_crop) {
        (true, true) => {
            let (resized_w, resized_h) = shortest_edge_dimensions(w, h, config.size.shortest_edge());
            // Part of the resized image that survives the crop
            let keep_w = resized_w.min(out_w);
            let keep_h = resized_h.min(out_h);

            // The same window in source pixels
            let src_w = ((keep_w as f64 * w as f64 / resized_w as f64).round() as u32).clamp(1, w);
            let src_h = ((keep_h as f64 * h as f64 / resized_h as f64).round() as u32).clamp(1, h);
            let window = image.crop_imm((w - src_w) / 2, (h - src_h) / 2, src_w, src_h);

            let resized = window.resize_exact(keep_w, keep_h, FilterType::CatmullRom);
            center_crop(&resized, out_w, out_h)
        }
        (false, true) => center_crop(image, out_w, out_h),
        (_, false) => image
            .resize_exact(out_w, out_h, FilterType::CatmullRom)
            .to_rgb8(),
    }
}

/// (width, height) after scaling so the shorter side equals `edge`
pub fn shortest_edge_dimensions(w: u32, h: u32, edge: u32) -> (u32, u32) {
    if w <= h {
        (edge, ((h as f64 * edge as f64 / w as f64) as u32).max(1))
    } else {
        (((w as f64 * edge as f64 / h as f64) as u32).max(1), edge)
    }
}

/// Center crop to (width, height), zero-padding any side that is too short
pub fn center_crop(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let (crop_w, crop_h) = (w.min(width), h.min(height));
    let rgb = image
        .crop_imm((w - crop_w) / 2, (h - crop_h) / 2, crop_w, crop_h)
        .to_rgb8();

    if crop_w == width && crop_h == height {
        return rgb;
    }

    let mut canvas = RgbImage::new(width, height);
    let offset_x = (width - crop_w) as i64 / 2;
    let offset_y = (height - crop_h) as i64 / 2;
    image::imageops::overlay(&mut canvas, &rgb, offset_x, offset_y);
    canvas
}
