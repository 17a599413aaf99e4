//! Production codec: `image` for decoding, libwebp for encoding.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::load_from_memory` (format sniffed from bytes) |
//! | Encode → WebP (lossy) | `webp::Encoder::encode(quality)` |
//! | Encode → WebP at [`Quality::MAX`] | `webp::Encoder::encode_lossless` |
//!
//! The `image` crate only ships a lossless WebP encoder, which inflates
//! photographic inputs several times over, so encoding goes through libwebp.

use super::backend::{CodecError, ImageCodec};
use super::params::Quality;
use image::{DynamicImage, ImageFormat};
use std::path::Path;

/// Decodes with the `image` crate and encodes with libwebp.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

/// Guess a mime type from a file extension, for transports that only have a
/// path (the CLI).
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path).ok().map(|f| f.to_mime_type())
}

/// Preferred extension for a mime type, e.g. `image/jpeg` → `jpg`.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    ImageFormat::from_mime_type(mime).and_then(|f| f.extensions_str().first().copied())
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
        // libwebp accepts 8-bit RGB(A) only; GIF palettes, 16-bit PNGs and
        // grayscale inputs are widened or narrowed here.
        let normalized = if image.color().has_alpha() {
            DynamicImage::ImageRgba8(image.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        };
        let encoder = webp::Encoder::from_image(&normalized)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let encoded = if quality.value() == Quality::MAX {
            encoder.encode_lossless()
        } else {
            encoder.encode(quality.value() as f32)
        };
        tracing::trace!(quality = quality.value(), bytes = encoded.len(), "encoded webp");
        Ok(encoded.to_vec())
    }
}
