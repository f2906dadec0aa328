//! Batch ingestion of a results directory.
//!
//! Walks every trial directory, feeds it through the [`TrialStore`] and
//! records what was ingested and what was skipped, per condition.

use std::collections::BTreeMap;
use std::path::Path;

use ccbench_core::error::Result;
use ccbench_core::models::Condition;
use chrono::Utc;
use tracing::{info, warn};

use crate::reader::{find_trial_dirs, load_trial};
use crate::store::{SkippedTrial, TrialStore};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the ingest report.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestMetadata {
    /// RFC 3339 timestamp when the batch was ingested.
    pub generated_at: String,
    /// Number of trial directories visited.
    pub directories_scanned: usize,
    /// Wall-clock seconds spent reading and parsing.
    pub load_time_seconds: f64,
}

/// One row of the per-condition ingest table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionCounts {
    /// `None` for trials whose label could not be decoded.
    pub condition: Option<Condition>,
    pub ingested: usize,
    pub skipped: usize,
}

/// Outcome of ingesting a results directory.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub ingested: BTreeMap<Condition, usize>,
    pub skipped: Vec<SkippedTrial>,
    pub metadata: IngestMetadata,
}

impl IngestReport {
    pub fn total_ingested(&self) -> usize {
        self.ingested.values().sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.len()
    }

    /// Ingested and skipped counts per condition, ascending, with the
    /// unlabelled bucket first when present.
    pub fn per_condition(&self) -> Vec<ConditionCounts> {
        let mut rows: BTreeMap<Option<Condition>, (usize, usize)> = BTreeMap::new();
        for (condition, count) in &self.ingested {
            rows.entry(Some(condition.clone())).or_default().0 += count;
        }
        for skip in &self.skipped {
            rows.entry(skip.condition.clone()).or_default().1 += 1;
        }
        rows.into_iter()
            .map(|(condition, (ingested, skipped))| ConditionCounts {
                condition,
                ingested,
                skipped,
            })
            .collect()
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Ingest every trial directory under `results_dir`.
///
/// Per-trial failures are logged once and recorded as skips; only an
/// unreadable root is returned as an error.
pub fn ingest_results(results_dir: &Path, log_name: &str) -> Result<(TrialStore, IngestReport)> {
    let load_start = std::time::Instant::now();
    let trial_dirs = find_trial_dirs(results_dir)?;

    let mut store = TrialStore::new();
    let mut ingested: BTreeMap<Condition, usize> = BTreeMap::new();
    let mut skipped: Vec<SkippedTrial> = Vec::new();

    for dir in &trial_dirs {
        match load_trial(&mut store, dir, log_name) {
            Ok(key) => *ingested.entry(key.condition).or_default() += 1,
            Err(skip) => {
                warn!(
                    "Skipping trial {} [{}]: {}",
                    skip.label,
                    skip.reason.category(),
                    skip.reason
                );
                skipped.push(skip);
            }
        }
    }

    let report = IngestReport {
        ingested,
        skipped,
        metadata: IngestMetadata {
            generated_at: Utc::now().to_rfc3339(),
            directories_scanned: trial_dirs.len(),
            load_time_seconds: load_start.elapsed().as_secs_f64(),
        },
    };

    info!(
        "Ingested {} trials, skipped {} ({} directories)",
        report.total_ingested(),
        report.total_skipped(),
        report.metadata.directories_scanned
    );
    for row in report.per_condition() {
        let name = row
            .condition
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unlabelled".to_string());
        info!("  {}: {} ingested, {} skipped", name, row.ingested, row.skipped);
    }

    Ok((store, report))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ccbench_core::error::BenchError;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_log(root: &Path, label: &str, content: &str) {
        let dir = root.join(label);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("client.json"), content).unwrap();
    }

    fn good_log() -> String {
        json!({
            "intervals": [
                {"sum": {"start": 0.0, "end": 1.0, "bits_per_second": 1e7, "retransmits": 1}},
            ]
        })
        .to_string()
    }

    #[test]
    fn test_ingest_counts_per_condition() {
        let tmp = TempDir::new().unwrap();
        write_log(tmp.path(), "reno_bw10_d20ms_q100_l0_r0", &good_log());
        write_log(tmp.path(), "reno_bw10_d20ms_q100_l0_r1", "garbage");
        write_log(tmp.path(), "bbr_bw50_d20ms_q100_l0_r0", &good_log());
        write_log(tmp.path(), "not-a-trial", &good_log());

        let (store, report) = ingest_results(tmp.path(), "client.json").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(report.total_ingested(), 2);
        assert_eq!(report.total_skipped(), 2);
        assert_eq!(report.metadata.directories_scanned, 4);

        let rows = report.per_condition();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].condition.is_none());
        assert_eq!(rows[0].skipped, 1);

        let bw10 = rows
            .iter()
            .find(|r| r.condition.as_ref().map(|c| c.bandwidth_mbps) == Some(10))
            .unwrap();
        assert_eq!((bw10.ingested, bw10.skipped), (1, 1));
    }

    #[test]
    fn test_ingest_missing_root_is_fatal() {
        let err = ingest_results(Path::new("/tmp/ccbench-missing-root-abc"), "client.json")
            .unwrap_err();
        assert!(matches!(err, BenchError::DataPathNotFound(_)));
    }

    #[test]
    fn test_ingest_empty_root() {
        let tmp = TempDir::new().unwrap();
        let (store, report) = ingest_results(tmp.path(), "client.json").unwrap();
        assert!(store.is_empty());
        assert!(report.per_condition().is_empty());
    }
}
