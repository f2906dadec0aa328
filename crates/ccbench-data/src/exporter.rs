//! Hand-off of aggregated tables to a rendering sink.
//!
//! [`SummaryExporter`] resolves display attributes for each algorithm and
//! passes the finished [`ConditionTable`] to a [`RenderSink`]. The bundled
//! [`CsvDirectorySink`] writes one directory per condition:
//!
//! ```text
//! <root>/bw50_d20ms_q100_l1.0/
//!     CUBIC_timeseries.csv
//!     summary.csv
//!     trials.csv
//!     manifest.json
//! <root>/overview.csv
//! ```

use std::path::{Path, PathBuf};

use ccbench_core::display::{DisplayAttributes, DisplayConfig};
use ccbench_core::error::{BenchError, Result};
use ccbench_core::models::{
    AlgorithmOverview, BinnedStat, Condition, ScalarSummary, Trial, TrialMetrics,
};
use serde::Serialize;
use tracing::debug;

use crate::aggregator::ConditionReport;
use crate::reader::NORMALIZED_TABLE;

// ── Contract ──────────────────────────────────────────────────────────────────

/// One algorithm's aggregated output, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmSeries {
    pub algorithm: String,
    pub display: DisplayAttributes,
    pub bins: Vec<BinnedStat>,
    pub summary: ScalarSummary,
    pub trials: Vec<TrialMetrics>,
}

/// Everything the sink receives for one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTable {
    pub condition: Condition,
    pub algorithms: Vec<AlgorithmSeries>,
}

/// Consumer of finished tables.
pub trait RenderSink {
    /// Receive the tables for one condition.
    fn accept(&mut self, table: &ConditionTable) -> Result<()>;

    /// Receive the cross-condition overview after the last condition.
    fn finish(&mut self, overview: &[AlgorithmOverview]) -> Result<()>;
}

/// Resolves display attributes and forwards tables to a sink.
#[derive(Debug, Clone, Default)]
pub struct SummaryExporter {
    display: DisplayConfig,
}

impl SummaryExporter {
    pub fn new(display: DisplayConfig) -> Self {
        Self { display }
    }

    /// Attach display attributes to a condition report.
    pub fn table(&self, report: ConditionReport) -> ConditionTable {
        let algorithms = report
            .algorithms
            .into_iter()
            .map(|alg| AlgorithmSeries {
                display: self.display.resolve(&alg.algorithm),
                algorithm: alg.algorithm,
                bins: alg.time_series,
                summary: alg.summary,
                trials: alg.trials,
            })
            .collect();
        ConditionTable {
            condition: report.condition,
            algorithms,
        }
    }

    /// Convert `report` and hand it to `sink`.
    pub fn export<S: RenderSink + ?Sized>(&self, sink: &mut S, report: ConditionReport) -> Result<()> {
        sink.accept(&self.table(report))
    }
}

// ── CsvDirectorySink ──────────────────────────────────────────────────────────

/// Writes CSV tables plus a JSON manifest per condition under `root`.
#[derive(Debug)]
pub struct CsvDirectorySink {
    root: PathBuf,
    written: Vec<PathBuf>,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    algorithm: &'a str,
    trial_count: usize,
    avg_throughput_mean: Option<f64>,
    avg_throughput_std: Option<f64>,
    retrans_per_mb_mean: Option<f64>,
    retrans_per_mb_std: Option<f64>,
}

#[derive(Serialize)]
struct TrialRow<'a> {
    algorithm: &'a str,
    label: &'a str,
    round: u32,
    avg_throughput: f64,
    total_retransmissions: u64,
    total_megabytes: f64,
    retrans_per_mb: Option<f64>,
}

impl<'a> TrialRow<'a> {
    fn new(algorithm: &'a str, m: &'a TrialMetrics) -> Self {
        Self {
            algorithm,
            label: &m.label,
            round: m.round,
            avg_throughput: m.avg_throughput,
            total_retransmissions: m.total_retransmissions,
            total_megabytes: m.total_megabytes,
            retrans_per_mb: m.retrans_per_mb,
        }
    }
}

#[derive(Serialize)]
struct Manifest<'a> {
    condition: String,
    bandwidth_mbps: u32,
    delay: &'a str,
    queue_depth: u32,
    loss_percent: f64,
    summary_file: &'static str,
    trials_file: &'static str,
    algorithms: Vec<ManifestEntry<'a>>,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    algorithm: &'a str,
    color: &'a str,
    label: Option<&'a str>,
    timeseries_file: String,
    trial_count: usize,
}

const SUMMARY_FILE: &str = "summary.csv";
const TRIALS_FILE: &str = "trials.csv";
const MANIFEST_FILE: &str = "manifest.json";
const OVERVIEW_FILE: &str = "overview.csv";

impl CsvDirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Vec::new(),
        }
    }

    /// Directory that receives the tables for `condition`.
    pub fn condition_dir(&self, condition: &Condition) -> PathBuf {
        self.root.join(condition.to_string())
    }

    /// Every file written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_csv<T: Serialize>(&mut self, path: PathBuf, rows: impl IntoIterator<Item = T>) -> Result<()> {
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|source| BenchError::FileWrite {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

fn timeseries_file(algorithm: &str) -> String {
    format!("{algorithm}_timeseries.csv")
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| BenchError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

impl RenderSink for CsvDirectorySink {
    fn accept(&mut self, table: &ConditionTable) -> Result<()> {
        let dir = self.condition_dir(&table.condition);
        create_dir(&dir)?;

        for series in &table.algorithms {
            self.write_csv(dir.join(timeseries_file(&series.algorithm)), &series.bins)?;
        }

        let summary_rows = table.algorithms.iter().map(|s| SummaryRow {
            algorithm: &s.algorithm,
            trial_count: s.summary.trial_count,
            avg_throughput_mean: s.summary.avg_throughput_mean,
            avg_throughput_std: s.summary.avg_throughput_std,
            retrans_per_mb_mean: s.summary.retrans_per_mb_mean,
            retrans_per_mb_std: s.summary.retrans_per_mb_std,
        });
        self.write_csv(dir.join(SUMMARY_FILE), summary_rows)?;

        let trial_rows = table
            .algorithms
            .iter()
            .flat_map(|s| s.trials.iter().map(move |m| TrialRow::new(&s.algorithm, m)));
        self.write_csv(dir.join(TRIALS_FILE), trial_rows)?;

        let c = &table.condition;
        let manifest = Manifest {
            condition: c.to_string(),
            bandwidth_mbps: c.bandwidth_mbps,
            delay: &c.delay,
            queue_depth: c.queue_depth,
            loss_percent: c.loss_percent,
            summary_file: SUMMARY_FILE,
            trials_file: TRIALS_FILE,
            algorithms: table
                .algorithms
                .iter()
                .map(|s| ManifestEntry {
                    algorithm: &s.algorithm,
                    color: &s.display.color,
                    label: s.display.label.as_deref(),
                    timeseries_file: timeseries_file(&s.algorithm),
                    trial_count: s.summary.trial_count,
                })
                .collect(),
        };
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(&path, json).map_err(|source| BenchError::FileWrite {
            path: path.clone(),
            source,
        })?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self, overview: &[AlgorithmOverview]) -> Result<()> {
        create_dir(&self.root)?;
        let path = self.root.join(OVERVIEW_FILE);
        self.write_csv(path, overview)
    }
}

// ── Normalized per-trial output ───────────────────────────────────────────────

/// Write `trial` as `<dir>/<label>/client.csv`
/// (`start,end,throughput_mbps,retransmissions`, in start order).
pub fn write_normalized_table(dir: &Path, trial: &Trial) -> Result<PathBuf> {
    let trial_dir = dir.join(&trial.label);
    create_dir(&trial_dir)?;
    let path = trial_dir.join(NORMALIZED_TABLE);

    let mut writer = csv::Writer::from_path(&path)?;
    for record in &trial.intervals {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| BenchError::FileWrite {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
