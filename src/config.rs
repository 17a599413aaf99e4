//! Service configuration module.
//!
//! Handles loading and validating `webp-shelf.toml`. Stock defaults are
//! overridden by whatever the user file specifies; every key is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! uploads_dir = "uploads"       # Spooled uploads, removed after conversion
//! converted_dir = "converted"   # Stored WebP artifacts
//! # sentinel_path = "/tmp/webp_shelf_cleanup.lock"  # Default: system temp dir
//!
//! [uploads]
//! max_file_size = 5242880       # Bytes (5 MiB)
//! allowed_types = ["image/jpeg", "image/png", "image/gif", "image/webp"]
//!
//! [conversion]
//! quality = 80                  # WebP quality (0-100)
//!
//! [retention]
//! retention_days = 7            # Delete files older than this
//! cleanup_interval_hours = 24   # Sweep at most this often
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [retention]
//! retention_days = 1
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::convert::UploadLimits;
use crate::imaging::Quality;
use crate::retention::RetentionPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "webp-shelf.toml";

/// Marker file name used when `storage.sentinel_path` is not set.
const DEFAULT_SENTINEL_NAME: &str = "webp_shelf_cleanup.lock";

/// One hundred years.
pub const MAX_RETENTION_DAYS: u64 = 36_500;

/// Ten years.
pub const MAX_CLEANUP_INTERVAL_HOURS: u64 = 87_600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `webp-shelf.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Where uploads, artifacts, and the cleanup sentinel live.
    pub storage: StorageConfig,
    /// Upload acceptance rules.
    pub uploads: UploadsConfig,
    /// Encoder settings.
    pub conversion: ConversionConfig,
    /// Artifact lifetime and sweep cadence.
    pub retention: RetentionConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conversion.quality > Quality::MAX {
            return Err(ConfigError::Validation(
                "conversion.quality must be 0-100".into(),
            ));
        }
        if self.uploads.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_file_size must be non-zero".into(),
            ));
        }
        if self.uploads.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "uploads.allowed_types must not be empty".into(),
            ));
        }
        if self.retention.retention_days == 0 {
            return Err(ConfigError::Validation(
                "retention.retention_days must be non-zero".into(),
            ));
        }
        if self.retention.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Validation(format!(
                "retention.retention_days must be at most {MAX_RETENTION_DAYS}"
            )));
        }
        if self.retention.cleanup_interval_hours > MAX_CLEANUP_INTERVAL_HOURS {
            return Err(ConfigError::Validation(format!(
                "retention.cleanup_interval_hours must be at most {MAX_CLEANUP_INTERVAL_HOURS}"
            )));
        }
        if self.storage.uploads_dir == self.storage.converted_dir {
            return Err(ConfigError::Validation(
                "storage.uploads_dir and storage.converted_dir must differ".into(),
            ));
        }
        // The sweep would age the marker out along with the files.
        let sentinel = self.storage.sentinel_path();
        if sentinel.starts_with(&self.storage.uploads_dir)
            || sentinel.starts_with(&self.storage.converted_dir)
        {
            return Err(ConfigError::Validation(
                "storage.sentinel_path must be outside uploads_dir and converted_dir".into(),
            ));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.conversion.quality)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_size: self.uploads.max_file_size,
            allowed_types: self.uploads.allowed_types.clone(),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_days_and_hours(
            self.retention.retention_days,
            self.retention.cleanup_interval_hours,
        )
    }
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory uploads are spooled to before conversion.
    pub uploads_dir: PathBuf,
    /// Directory holding converted artifacts.
    pub converted_dir: PathBuf,
    /// Cleanup marker file. Keep it outside both directories above.
    /// When absent, a file in the system temp directory is used.
    pub sentinel_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn sentinel_path(&self) -> PathBuf {
        self.sentinel_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SENTINEL_NAME))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            converted_dir: PathBuf::from("converted"),
            sentinel_path: None,
        }
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Largest accepted upload, in bytes.
    pub max_file_size: u64,
    /// Declared mime types accepted for conversion.
    pub allowed_types: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            allowed_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    /// WebP encoding quality (0 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default().value(),
        }
    }
}

/// Artifact lifetime and sweep cadence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Files older than this many days are deleted by the cleaner.
    pub retention_days: u64,
    /// Minimum hours between two automatic sweeps. 0 sweeps on every request.
    pub cleanup_interval_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            cleanup_interval_hours: 24,
        }
    }
}

// =============================================================================
// Config loading and validation
// =============================================================================

/// Parse a config document and validate it.
///
/// Every section and key is optional; `#[serde(default)]` fills the gaps with
/// the stock values.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file.
///
/// A missing file yields the stock defaults; a file that exists but does not
/// parse or validate is an error.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServiceConfig::default()),
        Err(e) => Err(e.into()),
    }
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# webp-shelf Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Uploads are spooled here and removed as soon as conversion finishes.
uploads_dir = "uploads"

# Converted WebP files, named {owner}_{token}_{timestamp}.webp.
converted_dir = "converted"

# Marker file whose modification time records the last cleanup.
# Keep it outside the two directories above. Defaults to the system
# temp directory.
# sentinel_path = "/tmp/webp_shelf_cleanup.lock"

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[uploads]
# Largest accepted upload in bytes (5 MiB).
max_file_size = 5242880

# Declared mime types accepted for conversion.
allowed_types = ["image/jpeg", "image/png", "image/gif", "image/webp"]

# ---------------------------------------------------------------------------
# Conversion
# ---------------------------------------------------------------------------
[conversion]
# WebP encoding quality (0 = worst, 100 = best).
quality = 80

# ---------------------------------------------------------------------------
# Retention
# ---------------------------------------------------------------------------
[retention]
# Uploads and converted files older than this many days are deleted.
retention_days = 7

# Automatic cleanup runs at most once per this many hours.
cleanup_interval_hours = 24
"##
}
