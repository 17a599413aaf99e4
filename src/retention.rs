//! Throttled, idempotent retention cleanup.
//!
//! The service has no background timer. Every request calls
//! [`RetentionCleaner::maybe_cleanup`]; the first request after the cleanup
//! interval has elapsed pays for a sweep, every other request pays one
//! sentinel read.
//!
//! ## Sentinel
//!
//! The time of the last sweep lives in a [`SentinelStore`]. In production that
//! is [`FileSentinel`]: the modification time of a marker file kept outside
//! the swept directories. The sentinel is updated at the end of every sweep,
//! including sweeps that deleted nothing or found a directory missing.
//!
//! ## Concurrency
//!
//! Within one process a mutex keeps sweeps from overlapping: a throttled
//! caller that finds a sweep in flight returns immediately. Across processes
//! there is no lock. Deleting a file that is already gone counts as a no-op,
//! and a lost sentinel update only makes the next sweep happen early.
//!
//! ## Failure handling
//!
//! A file that cannot be inspected or removed is logged and counted in
//! [`DirectorySweep::failed`]; the sweep moves on to the next entry.

use crate::clock::Clock;
use filetime::FileTime;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, SystemTime};

/// Storage for the time of the last completed sweep.
pub trait SentinelStore: Send + Sync {
    /// `Ok(None)` if no sweep has ever completed.
    fn last_run(&self) -> io::Result<Option<SystemTime>>;

    fn mark_run(&self, at: SystemTime) -> io::Result<()>;
}

/// Marker file whose mtime is the last sweep time.
#[derive(Debug, Clone)]
pub struct FileSentinel {
    path: PathBuf,
}

impl FileSentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SentinelStore for FileSentinel {
    fn last_run(&self) -> io::Result<Option<SystemTime>> {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn mark_run(&self, at: SystemTime) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        filetime::set_file_mtime(&self.path, FileTime::from_system_time(at))
    }
}

/// In-process sentinel, for tests and embedders without a writable temp dir.
#[derive(Debug, Default)]
pub struct MemorySentinel {
    last: Mutex<Option<SystemTime>>,
}

impl SentinelStore for MemorySentinel {
    fn last_run(&self) -> io::Result<Option<SystemTime>> {
        Ok(*self.last.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn mark_run(&self, at: SystemTime) -> io::Result<()> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
        Ok(())
    }
}

/// How old files may get, and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Files strictly older than this are deleted.
    pub retention_age: Duration,
    /// Minimum gap between two throttled sweeps.
    pub cleanup_interval: Duration,
}

impl RetentionPolicy {
    pub fn from_days_and_hours(retention_days: u64, cleanup_interval_hours: u64) -> Self {
        Self {
            retention_age: Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)),
            cleanup_interval: Duration::from_secs(cleanup_interval_hours.saturating_mul(60 * 60)),
        }
    }
}

/// Outcome of sweeping one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySweep {
    pub directory: PathBuf,
    pub deleted: usize,
    pub bytes_freed: u64,
    /// Entries that could not be inspected or removed.
    pub failed: usize,
}

impl DirectorySweep {
    fn empty(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            deleted: 0,
            bytes_freed: 0,
            failed: 0,
        }
    }
}

/// Outcome of one sweep across all managed directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub directories: Vec<DirectorySweep>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> usize {
        self.directories.iter().map(|d| d.deleted).sum()
    }

    pub fn total_bytes_freed(&self) -> u64 {
        self.directories.iter().map(|d| d.bytes_freed).sum()
    }

    /// Sweep result for a specific directory, if it was managed.
    pub fn for_directory(&self, dir: &Path) -> Option<&DirectorySweep> {
        self.directories.iter().find(|d| d.directory == dir)
    }
}

pub struct RetentionCleaner {
    directories: Vec<PathBuf>,
    policy: RetentionPolicy,
    sentinel: Arc<dyn SentinelStore>,
    clock: Arc<dyn Clock>,
    sweeping: Mutex<()>,
}

impl RetentionCleaner {
    pub fn new(
        directories: Vec<PathBuf>,
        policy: RetentionPolicy,
        sentinel: Arc<dyn SentinelStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directories,
            policy,
            sentinel,
            clock,
            sweeping: Mutex::new(()),
        }
    }

    /// Time of the last completed sweep; unreadable sentinels read as never.
    pub fn last_run(&self) -> Option<SystemTime> {
        self.sentinel.last_run().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cleanup sentinel unreadable");
            None
        })
    }

    /// Sweep if the cleanup interval has elapsed since the last sweep.
    ///
    /// Returns `None` when throttled or when another sweep is already running
    /// in this process.
    pub fn maybe_cleanup(&self) -> Option<CleanupReport> {
        if !self.is_due(self.clock.now()) {
            return None;
        }
        let _guard = match self.sweeping.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("cleanup already in progress");
                return None;
            }
        };
        // Another caller may have finished a sweep between the check and the lock.
        let now = self.clock.now();
        if !self.is_due(now) {
            return None;
        }
        Some(self.sweep(now))
    }

    /// Sweep unconditionally and reset the throttle window.
    pub fn force_cleanup(&self) -> CleanupReport {
        let _guard: MutexGuard<'_, ()> = self.sweeping.lock().unwrap_or_else(|e| e.into_inner());
        self.sweep(self.clock.now())
    }

    fn is_due(&self, now: SystemTime) -> bool {
        match self.last_run() {
            None => true,
            // A last-run time in the future reads as "just ran".
            Some(last) => now
                .duration_since(last)
                .is_ok_and(|elapsed| elapsed >= self.policy.cleanup_interval),
        }
    }

    fn sweep(&self, now: SystemTime) -> CleanupReport {
        let directories = self
            .directories
            .iter()
            .map(|dir| sweep_directory(dir, now, self.policy.retention_age))
            .collect();
        let report = CleanupReport { directories };

        if let Err(e) = self.sentinel.mark_run(now) {
            tracing::warn!(error = %e, "failed to update cleanup sentinel");
        }
        if report.total_deleted() > 0 {
            tracing::info!(
                deleted = report.total_deleted(),
                bytes_freed = report.total_bytes_freed(),
                "retention cleanup removed expired files"
            );
        } else {
            tracing::debug!("retention cleanup found nothing to remove");
        }
        report
    }
}

/// Delete every regular file in `dir` whose age exceeds `retention_age`.
///
/// Subdirectories and symlinks are left alone. A missing directory yields an
/// empty result.
pub fn sweep_directory(dir: &Path, now: SystemTime, retention_age: Duration) -> DirectorySweep {
    let mut sweep = DirectorySweep::empty(dir);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return sweep,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot read directory for cleanup");
            sweep.failed += 1;
            return sweep;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                sweep.failed += 1;
                continue;
            }
        };
        let path = entry.path();
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping entry without metadata");
                sweep.failed += 1;
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            sweep.failed += 1;
            continue;
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= retention_age {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                sweep.deleted += 1;
                sweep.bytes_freed += meta.len();
            }
            // Removed by a racing owner delete or another process's sweep.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete expired file");
                sweep.failed += 1;
            }
        }
    }

    if sweep.deleted > 0 {
        tracing::info!(
            dir = %dir.display(),
            deleted = sweep.deleted,
            mb_freed = sweep.bytes_freed as f64 / 1024.0 / 1024.0,
            "auto-cleanup"
        );
    }
    sweep
}
