//! Conversion pipeline: one uploaded image in, one stored artifact out.
//!
//! ```text
//! bytes ──▶ size check ──▶ mime allow-list ──▶ decode ──▶ encode ──▶ temp file ──▶ rename
//! ```
//!
//! Every step before the rename is side-effect free or writes only to a hidden
//! `.tmp-*` file in the converted directory. The rename is the commit point:
//! a lister either sees the complete artifact or nothing. If anything fails,
//! the temp file is dropped and removed, so a failed conversion leaves zero
//! files behind.
//!
//! [`Converter::convert_upload`] wraps the pipeline for transports that spool
//! uploads to disk first, and removes that spooled file on every outcome.

use crate::clock::Clock;
use crate::imaging::{ImageCodec, Quality};
use crate::naming::{Owner, artifact_name, generate_token, unix_seconds};
use crate::types::ArtifactMeta;
use filetime::FileTime;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// How many fresh tokens to try when a generated name already exists.
const MAX_NAME_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("File too large: {size} bytes (limit {max})")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),
    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConversionError {
    /// Validation failures are the caller's fault and are reported before any
    /// bytes are decoded.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::FileTooLarge { .. } | Self::UnsupportedFormat(_))
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub allowed_types: Vec<String>,
}

impl UploadLimits {
    /// Case-insensitive allow-list check; mime parameters (`; charset=…`) are
    /// ignored.
    pub fn allows(&self, mime: &str) -> bool {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        self.allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    }

    pub fn check(&self, size: u64, mime: &str) -> Result<(), ConversionError> {
        if size > self.max_file_size {
            return Err(ConversionError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        if !self.allows(mime) {
            return Err(ConversionError::UnsupportedFormat(mime.to_string()));
        }
        Ok(())
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedArtifact {
    pub artifact: ArtifactMeta,
    pub original_size: u64,
    /// `(1 - new/original) * 100`, rounded to two decimals. Negative when the
    /// output is larger than the input.
    pub reduction_percent: f64,
}

/// Percentage saved by a conversion, rounded to two decimal places.
pub fn reduction_percent(original: u64, converted: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let ratio = 1.0 - converted as f64 / original as f64;
    (ratio * 100.0 * 100.0).round() / 100.0
}

pub struct Converter {
    codec: Arc<dyn ImageCodec>,
    clock: Arc<dyn Clock>,
    limits: UploadLimits,
    output_dir: PathBuf,
}

impl Converter {
    pub fn new(
        codec: Arc<dyn ImageCodec>,
        clock: Arc<dyn Clock>,
        limits: UploadLimits,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            codec,
            clock,
            limits,
            output_dir: output_dir.into(),
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Convert in-memory bytes and store the result for `owner`.
    pub fn convert(
        &self,
        source: &[u8],
        declared_mime: &str,
        owner: &Owner,
        quality: Quality,
    ) -> Result<ConvertedArtifact, ConversionError> {
        let original_size = source.len() as u64;
        self.limits.check(original_size, declared_mime)?;

        let image = self
            .codec
            .decode(source)
            .map_err(|e| ConversionError::DecodeFailed(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ConversionError::DecodeFailed("image has no pixels".into()));
        }
        let encoded = self
            .codec
            .encode(&image, quality)
            .map_err(|e| ConversionError::EncodeFailed(e.to_string()))?;

        let created_at = self.clock.now();
        let path = self.write_artifact(owner, &encoded, created_at)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size_bytes = encoded.len() as u64;
        let reduction = reduction_percent(original_size, size_bytes);

        tracing::info!(
            owner = %owner,
            artifact = %name,
            original_size,
            size_bytes,
            reduction,
            "converted upload"
        );

        Ok(ConvertedArtifact {
            artifact: ArtifactMeta {
                name,
                path,
                size_bytes,
                created_at,
            },
            original_size,
            reduction_percent: reduction,
        })
    }

    /// Convert a spooled upload, then remove it whatever the outcome.
    pub fn convert_upload(
        &self,
        temp_path: &Path,
        declared_mime: &str,
        owner: &Owner,
        quality: Quality,
    ) -> Result<ConvertedArtifact, ConversionError> {
        let result = self.convert_spooled(temp_path, declared_mime, owner, quality);
        remove_spooled(temp_path);
        result
    }

    fn convert_spooled(
        &self,
        temp_path: &Path,
        declared_mime: &str,
        owner: &Owner,
        quality: Quality,
    ) -> Result<ConvertedArtifact, ConversionError> {
        // Reject oversized files before reading them into memory.
        let size = fs::metadata(temp_path)?.len();
        self.limits.check(size, declared_mime)?;
        let bytes = fs::read(temp_path)?;
        self.convert(&bytes, declared_mime, owner, quality)
    }

    fn write_artifact(
        &self,
        owner: &Owner,
        bytes: &[u8],
        created_at: std::time::SystemTime,
    ) -> Result<PathBuf, ConversionError> {
        fs::create_dir_all(&self.output_dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.output_dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        filetime::set_file_mtime(tmp.path(), FileTime::from_system_time(created_at))?;

        let timestamp = unix_seconds(created_at);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let target = self
                .output_dir
                .join(artifact_name(owner, &generate_token(), timestamp));
            match tmp.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => tmp = e.file,
                Err(e) => return Err(e.error.into()),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free artifact name after retries",
        )
        .into())
    }
}

/// Remove a spooled upload; an already-missing file is fine.
pub(crate) fn remove_spooled(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove spooled upload"),
    }
}
