//! Request-level operations.
//!
//! [`Service`] is what a transport (the CLI here, an HTTP handler elsewhere)
//! talks to. Each method is one user action:
//!
//! | Action | Method |
//! |---|---|
//! | upload | [`Service::upload`] |
//! | list | [`Service::list`] |
//! | delete | [`Service::delete`] |
//! | download-one | [`Service::download`] |
//! | download-all | [`Service::download_all`] |
//! | manual-cleanup | [`Service::manual_cleanup`] |
//! | stats | [`Service::stats`] |
//!
//! Every action except manual cleanup starts with an opportunistic
//! [`RetentionCleaner::maybe_cleanup`]. The first request after the cleanup
//! interval pays for the sweep; all others see a cheap no-op.

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::convert::{ConversionError, ConvertedArtifact, Converter, remove_spooled};
use crate::imaging::{ImageCodec, RustCodec, extension_for_mime};
use crate::naming::{
    ARTIFACT_EXTENSION, Authorizer, Owner, PrefixAuthorizer, base_name, generate_token,
    unix_seconds,
};
use crate::retention::{CleanupReport, FileSentinel, RetentionCleaner, SentinelStore};
use crate::store::{ArchiveCodec, ArtifactStore, StoreError, ZipArchiver};
use crate::types::{ArtifactMeta, RetentionStats};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Cannot prepare storage directory {path}: {source}")]
    Storage { path: PathBuf, source: io::Error },
}

/// One file received by a transport.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side file name; only used to label the spooled copy.
    pub file_name: String,
    /// Mime type declared by the client.
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Per-file result of a batch upload.
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    pub result: Result<ConvertedArtifact, ConversionError>,
}

/// A payload ready to hand back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Pluggable collaborators. [`Collaborators::production`] wires the real ones.
#[derive(Clone)]
pub struct Collaborators {
    pub codec: Arc<dyn ImageCodec>,
    pub clock: Arc<dyn Clock>,
    pub sentinel: Arc<dyn SentinelStore>,
    pub authorizer: Arc<dyn Authorizer>,
    pub archiver: Arc<dyn ArchiveCodec>,
}

impl Collaborators {
    pub fn production(config: &ServiceConfig) -> Self {
        Self {
            codec: Arc::new(RustCodec::new()),
            clock: Arc::new(SystemClock),
            sentinel: Arc::new(FileSentinel::new(config.storage.sentinel_path())),
            authorizer: Arc::new(PrefixAuthorizer),
            archiver: Arc::new(ZipArchiver),
        }
    }
}

pub struct Service {
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
    converter: Converter,
    store: ArtifactStore,
    cleaner: RetentionCleaner,
}

impl Service {
    /// Build a service and make sure both storage directories exist.
    pub fn new(config: ServiceConfig, parts: Collaborators) -> Result<Self, ServiceError> {
        for dir in [&config.storage.uploads_dir, &config.storage.converted_dir] {
            fs::create_dir_all(dir).map_err(|source| ServiceError::Storage {
                path: dir.clone(),
                source,
            })?;
        }

        let converter = Converter::new(
            parts.codec,
            parts.clock.clone(),
            config.upload_limits(),
            &config.storage.converted_dir,
        );
        let store = ArtifactStore::new(
            &config.storage.converted_dir,
            parts.authorizer,
            parts.archiver,
        );
        let cleaner = RetentionCleaner::new(
            vec![
                config.storage.converted_dir.clone(),
                config.storage.uploads_dir.clone(),
            ],
            config.retention_policy(),
            parts.sentinel,
            parts.clock.clone(),
        );

        Ok(Self {
            clock: parts.clock,
            config,
            converter,
            store,
            cleaner,
        })
    }

    /// Production wiring: pure-Rust codec, wall clock, file sentinel, zip bundles.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let parts = Collaborators::production(&config);
        Self::new(config, parts)
    }

    fn tick(&self) {
        if let Some(report) = self.cleaner.maybe_cleanup() {
            tracing::debug!(deleted = report.total_deleted(), "opportunistic cleanup ran");
        }
    }

    /// Convert a batch of uploads. One failing file never affects the others.
    pub fn upload(&self, owner: &Owner, uploads: Vec<Upload>) -> Vec<UploadOutcome> {
        self.tick();
        uploads
            .into_iter()
            .map(|upload| {
                let result = self.upload_one(owner, &upload);
                match &result {
                    Err(e) if e.is_validation() => {
                        tracing::info!(owner = %owner, file = %upload.file_name, error = %e, "upload rejected")
                    }
                    Err(e) => {
                        tracing::warn!(owner = %owner, file = %upload.file_name, error = %e, "upload failed")
                    }
                    Ok(_) => {}
                }
                UploadOutcome {
                    file_name: upload.file_name,
                    result,
                }
            })
            .collect()
    }

    fn upload_one(&self, owner: &Owner, upload: &Upload) -> Result<ConvertedArtifact, ConversionError> {
        // Validation failures never reach the uploads directory.
        self.converter
            .limits()
            .check(upload.bytes.len() as u64, &upload.mime)?;

        let spooled = self.config.storage.uploads_dir.join(format!(
            "{}_{}",
            generate_token(),
            spool_label(&upload.file_name, &upload.mime)
        ));
        if let Err(e) = fs::write(&spooled, &upload.bytes) {
            remove_spooled(&spooled);
            return Err(e.into());
        }
        self.converter
            .convert_upload(&spooled, &upload.mime, owner, self.config.quality())
    }

    pub fn list(&self, owner: &Owner) -> Result<Vec<ArtifactMeta>, StoreError> {
        self.tick();
        self.store.list_artifacts(owner)
    }

    pub fn delete(&self, owner: &Owner, file_name: &str) -> Result<(), StoreError> {
        self.tick();
        self.store.delete_artifact(owner, file_name)
    }

    pub fn download(&self, owner: &Owner, file_name: &str) -> Result<Download, StoreError> {
        self.tick();
        let bytes = self.store.read_artifact(owner, file_name)?;
        Ok(Download {
            file_name: base_name(file_name).unwrap_or(file_name).to_string(),
            content_type: "image/webp",
            bytes,
        })
    }

    /// Every owned artifact in one archive, or [`StoreError::Empty`].
    pub fn download_all(&self, owner: &Owner) -> Result<Download, StoreError> {
        self.tick();
        let bytes = self.store.bundle_all(owner)?;
        let archiver = self.store.archiver();
        Ok(Download {
            file_name: format!(
                "webp_images_{}.{}",
                unix_seconds(self.clock.now()),
                archiver.extension()
            ),
            content_type: archiver.content_type(),
            bytes,
        })
    }

    pub fn manual_cleanup(&self) -> CleanupReport {
        self.cleaner.force_cleanup()
    }

    pub fn stats(&self, owner: &Owner) -> Result<RetentionStats, StoreError> {
        self.tick();
        Ok(RetentionStats {
            converted_files: self.store.count_artifacts(owner)?,
            pending_uploads: count_files(&self.config.storage.uploads_dir)?,
            retention_days: self.config.retention.retention_days,
            cleanup_interval_hours: self.config.retention.cleanup_interval_hours,
            last_cleanup: self.cleaner.last_run(),
        })
    }
}

/// File-system-safe label for a spooled upload, derived from the client name.
fn spool_label(file_name: &str, mime: &str) -> String {
    let label: String = base_name(file_name)
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let label = label.trim_start_matches('.');
    if label.is_empty() {
        let ext = extension_for_mime(mime).unwrap_or(ARTIFACT_EXTENSION);
        format!("upload.{ext}")
    } else {
        label.to_string()
    }
}

fn count_files(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut count = 0;
    for entry in entries {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
