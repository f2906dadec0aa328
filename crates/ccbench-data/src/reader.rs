//! Trial directory discovery and loading.
//!
//! The results root holds one directory per trial, named after the trial
//! label. Each directory carries the raw measurement log (`client.json` by
//! default) or, for trials normalized earlier, only the flat
//! `client.csv` table.

use std::path::{Path, PathBuf};

use ccbench_core::error::{BenchError, Result};
use ccbench_core::label::parse_label;
use ccbench_core::models::{ConditionKey, IntervalRecord};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::log_parser::{integral_count, LogParseError};
use crate::store::{SkipReason, SkippedTrial, TrialStore};

/// File name of the normalized per-trial table.
pub const NORMALIZED_TABLE: &str = "client.csv";

// ── Public API ────────────────────────────────────────────────────────────────

/// List trial directories directly under `results_dir`, sorted by name.
///
/// A missing or unreadable root is the one fatal condition of a batch.
pub fn find_trial_dirs(results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !results_dir.is_dir() {
        return Err(BenchError::DataPathNotFound(results_dir.to_path_buf()));
    }
    std::fs::read_dir(results_dir).map_err(|source| BenchError::FileRead {
        path: results_dir.to_path_buf(),
        source,
    })?;

    let dirs: Vec<PathBuf> = walkdir::WalkDir::new(results_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", results_dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    debug!(
        "Found {} trial directories in {}",
        dirs.len(),
        results_dir.display()
    );
    Ok(dirs)
}

/// Load one trial directory into `store`.
///
/// Prefers the raw log named `log_name`; falls back to the normalized table
/// when only that exists.
pub fn load_trial(
    store: &mut TrialStore,
    trial_dir: &Path,
    log_name: &str,
) -> std::result::Result<ConditionKey, SkippedTrial> {
    let label = trial_label(trial_dir);
    let log_path = trial_dir.join(log_name);
    let table_path = trial_dir.join(NORMALIZED_TABLE);

    if log_path.is_file() {
        let raw = std::fs::read(&log_path)
            .map_err(|e| skip_before_parse(&label, unreadable(&log_path, e)))?;
        store.ingest(&label, &raw)
    } else if table_path.is_file() {
        debug!("No raw log for {}; using {}", label, table_path.display());
        let records =
            read_normalized_table(&table_path).map_err(|reason| skip_before_parse(&label, reason))?;
        store.ingest_records(&label, records)
    } else {
        Err(skip_before_parse(&label, SkipReason::MissingResource(log_path)))
    }
}

/// Read a `start,end,throughput_mbps,retransmissions` table.
///
/// Rows that would violate the record invariants are discarded one by one;
/// a table that cannot be decoded at all is a parse failure.
pub fn read_normalized_table(path: &Path) -> std::result::Result<Vec<IntervalRecord>, SkipReason> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SkipReason::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<NormalizedRow>().enumerate() {
        let row = row.map_err(|e| SkipReason::Parse(LogParseError::Decode(e.to_string())))?;
        match row.into_record() {
            Some(record) => records.push(record),
            None => debug!("Discarding unusable row {} in {}", idx + 1, path.display()),
        }
    }
    Ok(records)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NormalizedRow {
    start: f64,
    end: f64,
    throughput_mbps: f64,
    #[serde(default)]
    retransmissions: Option<f64>,
}

impl NormalizedRow {
    fn into_record(self) -> Option<IntervalRecord> {
        let retransmissions = match self.retransmissions {
            None => 0,
            Some(r) => integral_count(r)?,
        };
        IntervalRecord::new(self.start, self.end, self.throughput_mbps, retransmissions)
    }
}

/// Trial label = directory name.
fn trial_label(trial_dir: &Path) -> String {
    trial_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn unreadable(path: &Path, e: std::io::Error) -> SkipReason {
    SkipReason::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Skip raised before the store saw the trial; the condition is recovered
/// from the label when it decodes.
fn skip_before_parse(label: &str, reason: SkipReason) -> SkippedTrial {
    SkippedTrial {
        label: label.to_string(),
        condition: parse_label(label).ok().map(|l| l.key.condition),
        reason,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
