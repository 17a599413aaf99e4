//! Image codec trait and shared error type.
//!
//! The [`ImageCodec`] trait defines the two operations the conversion pipeline
//! needs: decode arbitrary uploaded bytes into pixels, and encode pixels into
//! the stored format.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), pure Rust, statically
//! linked.

use super::params::Quality;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Trait for image codecs.
///
/// Implementations must be `Send + Sync`: one codec instance is shared by every
/// request the service handles.
pub trait ImageCodec: Send + Sync {
    /// Decode uploaded bytes. The format is sniffed from the content, not
    /// from the declared mime type.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError>;

    /// Encode a decoded image to the stored artifact format.
    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, CodecError>;
}
