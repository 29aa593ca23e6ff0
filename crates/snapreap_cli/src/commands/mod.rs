//! CLI command implementations.

pub mod count;
pub mod expire;
pub mod inspect;
pub mod list;

use crate::error::CliError;
use serde::Serialize;
use snapreap_core::{LoadOptions, Snapshot};
use snapreap_engine::ReapReport;
use std::path::Path;
use tracing::info;

/// Output format of a command's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a `--format` value.
    pub fn parse(value: &str) -> Result<Self, CliError> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

/// Loads a snapshot file, fully verified unless `verify` is false.
pub fn load_snapshot(path: &Path, verify: bool) -> Result<Snapshot, CliError> {
    let options = LoadOptions::new().verify_checksum(verify);
    let snapshot = Snapshot::open_with(path, &options).map_err(|source| CliError::Load {
        path: path.display().to_string(),
        source,
    })?;
    info!(
        path = %path.display(),
        nodes = snapshot.tree.len(),
        sessions = snapshot.sessions.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Totals of a run, as printed by `count` and `expire`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Scan root.
    pub root: String,
    /// Whether deletes were skipped.
    pub dry_run: bool,
    /// Number of expired subtrees.
    pub candidates: usize,
    /// Nodes counted as deleted.
    pub deleted_count: u64,
    /// Approximate bytes freed.
    pub deleted_bytes: u64,
    /// Nodes already gone from the live service.
    pub already_absent: u64,
    /// Nodes whose live version had changed.
    pub version_mismatches: u64,
    /// Nodes whose delete failed.
    pub failures: u64,
    /// Retried delete attempts.
    pub retries: u64,
    /// Whether the run stopped early.
    pub cancelled: bool,
}

impl From<&ReapReport> for RunSummary {
    fn from(report: &ReapReport) -> Self {
        Self {
            root: report.root.clone(),
            dry_run: report.dry_run,
            candidates: report.candidates.len(),
            deleted_count: report.stats.deleted_count,
            deleted_bytes: report.stats.deleted_bytes,
            already_absent: report.stats.already_absent,
            version_mismatches: report.stats.version_mismatches,
            failures: report.stats.failures,
            retries: report.stats.retries,
            cancelled: report.cancelled,
        }
    }
}

/// Prints a run summary.
pub fn print_summary(
    title: &str,
    summary: &RunSummary,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            let mode = if summary.dry_run { " (dry run)" } else { "" };
            println!("{title} under {}{mode}", summary.root);
            println!("  Expired subtrees:   {}", summary.candidates);
            println!("  Nodes deleted:      {}", summary.deleted_count);
            println!("  Bytes freed:        {}", format_size(summary.deleted_bytes));
            if !summary.dry_run {
                println!("  Already absent:     {}", summary.already_absent);
                println!("  Version mismatches: {}", summary.version_mismatches);
                println!("  Failures:           {}", summary.failures);
            }
            if summary.cancelled {
                println!("  Run cancelled before completion");
            }
        }
    }
    Ok(())
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
