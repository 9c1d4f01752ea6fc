//! Pre-processing for frames headed into a recognizer: bound the dimensions,
//! push pixel values away from mid-gray, re-encode as JPEG.
//!
//! Every failure path degrades to returning the input unchanged. A frame the
//! normalizer cannot handle is still worth sending to the recognizer as-is.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage};
use log::warn;

use super::EncodedImage;

/// Tunable thresholds for [`normalize_with`].
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Longest output side; larger frames are scaled down, never up.
    pub max_dimension: u32,
    /// Channel mean below this darkens the pixel, at or above lightens it.
    pub contrast_threshold: u8,
    /// How far each pixel is pushed away from the threshold.
    pub contrast_shift: u8,
    /// JPEG encode quality (0-100).
    pub jpeg_quality: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            contrast_threshold: 120,
            contrast_shift: 40,
            jpeg_quality: 85,
        }
    }
}

/// Normalize with the default configuration.
pub fn normalize(input: &EncodedImage) -> EncodedImage {
    normalize_with(input, &NormalizeConfig::default())
}

/// Resize to the configured bound (aspect preserved, rounded to nearest),
/// apply the contrast push, and re-encode as JPEG.
///
/// Fail-soft: undecodable input, zero dimensions, or a degenerate encode all
/// return a clone of the input. This function never errors.
pub fn normalize_with(input: &EncodedImage, config: &NormalizeConfig) -> EncodedImage {
    let img = match image::load_from_memory(&input.bytes) {
        Ok(img) => img,
        Err(err) => {
            warn!("frame not decodable, passing through unmodified: {err}");
            return input.clone();
        }
    };

    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return input.clone();
    }

    let (target_w, target_h) = scaled_dimensions(width, height, config.max_dimension);
    let img = if (target_w, target_h) != (width, height) {
        img.resize_exact(target_w, target_h, FilterType::Triangle)
    } else {
        img
    };

    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, _a] = pixel.0;
        let mean = ((r as u16 + g as u16 + b as u16) / 3) as u8;
        let value = if mean < config.contrast_threshold {
            mean.saturating_sub(config.contrast_shift)
        } else {
            mean.saturating_add(config.contrast_shift)
        };
        pixel.0[0] = value;
        pixel.0[1] = value;
        pixel.0[2] = value;
    }

    // JPEG has no alpha channel; the transform above never touches it anyway.
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut encoded), config.jpeg_quality);
    if let Err(err) = DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder) {
        warn!("JPEG re-encode failed, passing frame through unmodified: {err}");
        return input.clone();
    }

    // A JPEG this small cannot hold a real frame.
    if encoded.len() < 128 {
        warn!(
            "re-encode produced a degenerate payload ({} bytes), passing frame through",
            encoded.len()
        );
        return input.clone();
    }

    EncodedImage::jpeg(encoded)
}

/// Scale both sides so the larger one equals `max_dimension`, preserving
/// aspect ratio. Fractional results round to nearest, floored at 1. Frames
/// already within the bound keep their dimensions.
fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let larger = width.max(height);
    if larger <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f64 / larger as f64;
    let scaled_w = ((width as f64 * scale).round() as u32).max(1);
    let scaled_h = ((height as f64 * scale).round() as u32).max(1);
    (scaled_w, scaled_h)
}
