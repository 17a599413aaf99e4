//! Owner-scoped access to converted artifacts.
//!
//! The store is a view over one flat directory. It keeps no state of its own:
//! every call re-reads the directory, so listings are restartable and always
//! reflect concurrent uploads, deletes, and retention sweeps.
//!
//! All access goes through an [`Authorizer`]. Read and delete check the
//! caller-supplied name before touching the filesystem, and report
//! [`StoreError::Unauthorized`] without revealing whether the target exists.
//!
//! Bundling hands every owned artifact to an [`ArchiveCodec`]. The production
//! codec is [`ZipArchiver`]; the bundle is returned in memory and never
//! written to disk.

use crate::naming::{Authorizer, Owner, base_name};
use crate::types::ArtifactMeta;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("No files to download")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// One file to place in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name inside the archive.
    pub name: String,
    pub data: Vec<u8>,
}

/// Packs entries into a single downloadable archive.
pub trait ArchiveCodec: Send + Sync {
    fn create_archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError>;

    /// Mime type of the produced archive.
    fn content_type(&self) -> &'static str;

    /// File extension of the produced archive, without the dot.
    fn extension(&self) -> &'static str;
}

/// In-memory zip with stored (uncompressed) entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl ArchiveCodec for ZipArchiver {
    fn create_archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for entry in entries {
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    fn content_type(&self) -> &'static str {
        "application/zip"
    }

    fn extension(&self) -> &'static str {
        "zip"
    }
}

pub struct ArtifactStore {
    dir: PathBuf,
    authorizer: Arc<dyn Authorizer>,
    archiver: Arc<dyn ArchiveCodec>,
}

impl ArtifactStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        authorizer: Arc<dyn Authorizer>,
        archiver: Arc<dyn ArchiveCodec>,
    ) -> Self {
        Self {
            dir: dir.into(),
            authorizer,
            archiver,
        }
    }

    pub fn archiver(&self) -> &dyn ArchiveCodec {
        self.archiver.as_ref()
    }

    /// Artifacts owned by `owner`, most recently created first.
    ///
    /// A missing directory lists as empty.
    pub fn list_artifacts(&self, owner: &Owner) -> Result<Vec<ArtifactMeta>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !self.authorizer.is_authorized(owner, &name) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }
            artifacts.push(ArtifactMeta {
                path: entry.path(),
                size_bytes: meta.len(),
                created_at: meta.modified()?,
                name,
            });
        }

        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(artifacts)
    }

    pub fn count_artifacts(&self, owner: &Owner) -> Result<usize, StoreError> {
        Ok(self.list_artifacts(owner)?.len())
    }

    /// Resolve a caller-supplied name to a path inside the store, or refuse.
    fn authorized_path(&self, owner: &Owner, file_name: &str) -> Result<(String, PathBuf), StoreError> {
        if !self.authorizer.is_authorized(owner, file_name) {
            tracing::warn!(owner = %owner, requested = file_name, "unauthorized artifact access");
            return Err(StoreError::Unauthorized);
        }
        let name = base_name(file_name)
            .ok_or(StoreError::Unauthorized)?
            .to_string();
        let path = self.dir.join(&name);
        Ok((name, path))
    }

    pub fn delete_artifact(&self, owner: &Owner, file_name: &str) -> Result<(), StoreError> {
        let (name, path) = self.authorized_path(owner, file_name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(owner = %owner, artifact = %name, "deleted artifact");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes of one owned artifact.
    pub fn read_artifact(&self, owner: &Owner, file_name: &str) -> Result<Vec<u8>, StoreError> {
        let (name, path) = self.authorized_path(owner, file_name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Archive every owned artifact, entry names being their base names.
    ///
    /// Artifacts removed between listing and reading are left out; if that
    /// leaves nothing, the result is [`StoreError::Empty`].
    pub fn bundle_all(&self, owner: &Owner) -> Result<Vec<u8>, StoreError> {
        let artifacts = self.list_artifacts(owner)?;
        let mut entries = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            match fs::read(&artifact.path) {
                Ok(data) => entries.push(ArchiveEntry {
                    name: artifact.name,
                    data,
                }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if entries.is_empty() {
            return Err(StoreError::Empty);
        }
        Ok(self.archiver.create_archive(&entries)?)
    }
}
