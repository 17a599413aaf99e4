//! CLI output formatting for every service operation.
//!
//! Output is artifact-first: each line leads with the stored name (or the
//! client file name for uploads), with sizes and times as trailing detail.
//!
//! ## Upload
//!
//! ```text
//! cat.jpg → user_abc_18c4f2a9b3e1d7a0c2f4_1700000000.webp (41.2 KB, 63.10% smaller)
//! notes.pdf: Unsupported format: application/pdf
//! Converted 1 of 2 files
//! ```
//!
//! ## List
//!
//! ```text
//! 001 user_abc_18c4f2a9b3e1d7a0c2f4_1700000002.webp
//!     12.0 KB, created 2023-11-14 22:13:22
//! 002 user_abc_18c4f2a9b3e1d7a0aa01_1700000000.webp
//!     41.2 KB, created 2023-11-14 22:13:20
//! ```
//!
//! ## Cleanup
//!
//! ```text
//! converted: 3 deleted, 1.20 MB freed
//! uploads: 0 deleted, 0 B freed
//! Removed 3 files (1.20 MB)
//! ```
//!
//! Each operation has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure apart from rendering times in the local timezone.

use crate::convert::ConvertedArtifact;
use crate::retention::CleanupReport;
use crate::service::UploadOutcome;
use crate::types::{ArtifactMeta, RetentionStats};
use serde_json::json;
use std::time::SystemTime;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count with one or two decimals.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Local `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn format_reduction(converted: &ConvertedArtifact) -> String {
    if converted.reduction_percent >= 0.0 {
        format!("{:.2}% smaller", converted.reduction_percent)
    } else {
        format!("{:.2}% larger", -converted.reduction_percent)
    }
}

// ============================================================================
// Upload
// ============================================================================

pub fn format_upload_outcomes(outcomes: &[UploadOutcome]) -> Vec<String> {
    let mut lines = Vec::with_capacity(outcomes.len() + 1);
    let mut converted = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(c) => {
                converted += 1;
                lines.push(format!(
                    "{} \u{2192} {} ({}, {})",
                    outcome.file_name,
                    c.artifact.name,
                    format_size(c.artifact.size_bytes),
                    format_reduction(c)
                ));
            }
            Err(e) => lines.push(format!("{}: {}", outcome.file_name, e)),
        }
    }
    lines.push(format!("Converted {} of {} files", converted, outcomes.len()));
    lines
}

pub fn print_upload_outcomes(outcomes: &[UploadOutcome]) {
    print_lines(format_upload_outcomes(outcomes));
}

/// JSON shape for upload results: one object per input file.
pub fn upload_outcomes_json(outcomes: &[UploadOutcome]) -> serde_json::Value {
    let items: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(c) => json!({
                "file_name": outcome.file_name,
                "success": true,
                "converted": c,
            }),
            Err(e) => json!({
                "file_name": outcome.file_name,
                "success": false,
                "error": e.to_string(),
            }),
        })
        .collect();
    serde_json::Value::Array(items)
}

// ============================================================================
// List
// ============================================================================

pub fn format_artifact_list(artifacts: &[ArtifactMeta]) -> Vec<String> {
    if artifacts.is_empty() {
        return vec!["No converted files".to_string()];
    }
    let mut lines = Vec::with_capacity(artifacts.len() * 2);
    for (i, artifact) in artifacts.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), artifact.name));
        lines.push(format!(
            "    {}, created {}",
            format_size(artifact.size_bytes),
            format_timestamp(artifact.created_at)
        ));
    }
    lines
}

pub fn print_artifact_list(artifacts: &[ArtifactMeta]) {
    print_lines(format_artifact_list(artifacts));
}

// ============================================================================
// Cleanup
// ============================================================================

pub fn format_cleanup_report(report: &CleanupReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.directories.len() + 1);
    for sweep in &report.directories {
        let mut line = format!(
            "{}: {} deleted, {} freed",
            sweep.directory.display(),
            sweep.deleted,
            format_size(sweep.bytes_freed)
        );
        if sweep.failed > 0 {
            line.push_str(&format!(", {} failed", sweep.failed));
        }
        lines.push(line);
    }
    lines.push(format!(
        "Removed {} files ({})",
        report.total_deleted(),
        format_size(report.total_bytes_freed())
    ));
    lines
}

pub fn print_cleanup_report(report: &CleanupReport) {
    print_lines(format_cleanup_report(report));
}

// ============================================================================
// Stats
// ============================================================================

pub fn format_stats(stats: &RetentionStats) -> Vec<String> {
    let last = stats
        .last_cleanup
        .map(format_timestamp)
        .unwrap_or_else(|| "Never".to_string());
    vec![
        format!("Converted files: {}", stats.converted_files),
        format!("Pending uploads: {}", stats.pending_uploads),
        format!("Retention: {} days", stats.retention_days),
        format!("Cleanup interval: {} hours", stats.cleanup_interval_hours),
        format!("Last cleanup: {}", last),
    ]
}

pub fn print_stats(stats: &RetentionStats) {
    print_lines(format_stats(stats));
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConversionError;
    use crate::retention::DirectorySweep;
    use std::path::PathBuf;
    use std::time::Duration;

    fn artifact(name: &str, size: u64) -> ArtifactMeta {
        ArtifactMeta {
            name: name.into(),
            path: PathBuf::from("converted").join(name),
            size_bytes: size,
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    fn converted(name: &str, size: u64, reduction: f64) -> ConvertedArtifact {
        ConvertedArtifact {
            artifact: artifact(name, size),
            original_size: 4096,
            reduction_percent: reduction,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn timestamp_has_fixed_shape() {
        let text = format_timestamp(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        assert_eq!(text.len(), 19);
        assert_eq!(&text[4..5], "-");
        assert_eq!(&text[10..11], " ");
        assert_eq!(&text[13..14], ":");
    }

    #[test]
    fn upload_lines_show_success_and_failure() {
        let outcomes = vec![
            UploadOutcome {
                file_name: "cat.jpg".into(),
                result: Ok(converted("user_abc_t_1.webp", 2048, 50.0)),
            },
            UploadOutcome {
                file_name: "notes.pdf".into(),
                result: Err(ConversionError::UnsupportedFormat("application/pdf".into())),
            },
        ];
        let lines = format_upload_outcomes(&outcomes);
        assert_eq!(
            lines,
            vec![
                "cat.jpg \u{2192} user_abc_t_1.webp (2.0 KB, 50.00% smaller)",
                "notes.pdf: Unsupported format: application/pdf",
                "Converted 1 of 2 files",
            ]
        );
    }

    #[test]
    fn upload_line_reports_growth() {
        let outcomes = vec![UploadOutcome {
            file_name: "tiny.gif".into(),
            result: Ok(converted("user_abc_t_1.webp", 100, -12.5)),
        }];
        assert!(format_upload_outcomes(&outcomes)[0].ends_with("(100 B, 12.50% larger)"));
    }

    #[test]
    fn upload_json_flags_each_file() {
        let outcomes = vec![
            UploadOutcome {
                file_name: "cat.jpg".into(),
                result: Ok(converted("user_abc_t_1.webp", 2048, 50.0)),
            },
            UploadOutcome {
                file_name: "big.png".into(),
                result: Err(ConversionError::FileTooLarge { size: 10, max: 5 }),
            },
        ];
        let value = upload_outcomes_json(&outcomes);
        assert_eq!(value[0]["success"], true);
        assert_eq!(value[0]["converted"]["artifact"]["name"], "user_abc_t_1.webp");
        assert_eq!(value[0]["converted"]["artifact"]["created_at"], 1_700_000_000u64);
        assert_eq!(value[1]["success"], false);
        assert_eq!(value[1]["error"], "File too large: 10 bytes (limit 5)");
    }

    #[test]
    fn empty_list() {
        assert_eq!(format_artifact_list(&[]), vec!["No converted files"]);
    }

    #[test]
    fn list_numbers_artifacts_in_order() {
        let lines = format_artifact_list(&[artifact("b.webp", 10), artifact("a.webp", 2048)]);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "001 b.webp");
        assert!(lines[1].starts_with("    10 B, created "));
        assert_eq!(lines[2], "002 a.webp");
        assert!(lines[3].starts_with("    2.0 KB, created "));
    }

    #[test]
    fn cleanup_report_lines() {
        let report = CleanupReport {
            directories: vec![
                DirectorySweep {
                    directory: "converted".into(),
                    deleted: 3,
                    bytes_freed: 3 * 1024 * 1024,
                    failed: 0,
                },
                DirectorySweep {
                    directory: "uploads".into(),
                    deleted: 0,
                    bytes_freed: 0,
                    failed: 2,
                },
            ],
        };
        assert_eq!(
            format_cleanup_report(&report),
            vec![
                "converted: 3 deleted, 3.00 MB freed",
                "uploads: 0 deleted, 0 B freed, 2 failed",
                "Removed 3 files (3.00 MB)",
            ]
        );
    }

    #[test]
    fn stats_show_never_before_first_cleanup() {
        let stats = RetentionStats {
            converted_files: 2,
            pending_uploads: 0,
            retention_days: 7,
            cleanup_interval_hours: 24,
            last_cleanup: None,
        };
        let lines = format_stats(&stats);
        assert_eq!(lines[0], "Converted files: 2");
        assert_eq!(lines[2], "Retention: 7 days");
        assert_eq!(lines[4], "Last cleanup: Never");
    }

    #[test]
    fn stats_show_last_cleanup_time() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let stats = RetentionStats {
            converted_files: 0,
            pending_uploads: 1,
            retention_days: 7,
            cleanup_interval_hours: 24,
            last_cleanup: Some(at),
        };
        assert_eq!(
            format_stats(&stats)[4],
            format!("Last cleanup: {}", format_timestamp(at))
        );
    }
}
