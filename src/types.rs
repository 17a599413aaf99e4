//! Shared types returned across the pipeline, store, and service.
//!
//! These are serialized to JSON by the CLI's `--json` mode, so field names are
//! part of the output contract.

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::SystemTime;

/// A stored, converted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    /// Base file name, `{owner}_{token}_{timestamp}.webp`.
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// File modification time; the pipeline stamps it at creation.
    #[serde(serialize_with = "unix_seconds")]
    pub created_at: SystemTime,
}

/// Per-owner view of storage and retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionStats {
    /// Artifacts owned by the requesting session.
    pub converted_files: usize,
    /// Files waiting in the uploads directory, across all sessions.
    pub pending_uploads: usize,
    pub retention_days: u64,
    pub cleanup_interval_hours: u64,
    /// `None` until the first cleanup has run.
    #[serde(serialize_with = "optional_unix_seconds")]
    pub last_cleanup: Option<SystemTime>,
}

fn unix_seconds<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(crate::naming::unix_seconds(*time))
}

fn optional_unix_seconds<S: Serializer>(
    time: &Option<SystemTime>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => s.serialize_some(&crate::naming::unix_seconds(*t)),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn artifact_serializes_created_at_as_unix_seconds() {
        let meta = ArtifactMeta {
            name: "u_t_1.webp".into(),
            path: "converted/u_t_1.webp".into(),
            size_bytes: 10,
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["created_at"], 1_700_000_000);
        assert_eq!(json["size_bytes"], 10);
    }

    #[test]
    fn stats_serialize_never_run_as_null() {
        let stats = RetentionStats {
            converted_files: 0,
            pending_uploads: 0,
            retention_days: 7,
            cleanup_interval_hours: 24,
            last_cleanup: None,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["last_cleanup"].is_null());
    }
}
