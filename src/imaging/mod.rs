//! Image codec boundary: decode anything allowed, encode to WebP.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** (JPEG, PNG, GIF, WebP) | `image::load_from_memory` |
//! | **Encode → WebP** | `webp::Encoder` (lossy, lossless at quality 100) |
//! | **Mime lookup** | `image::ImageFormat::from_mime_type` |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`]
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]

pub mod backend;
mod params;
pub mod rust_backend;

pub use backend::{CodecError, ImageCodec};
pub use params::Quality;
pub use rust_backend::{RustCodec, extension_for_mime, mime_for_path};
