//! Keyed storage of parsed trials.
//!
//! Trials are grouped by round-independent [`Condition`] and then by
//! canonical algorithm name. A trial is inserted only once it is fully
//! parsed, so readers never observe a partial trial.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ccbench_core::label::{parse_label, LabelError};
use ccbench_core::models::{canonical_algorithm, Condition, ConditionKey, IntervalRecord, Trial};
use thiserror::Error;
use tracing::debug;

use crate::log_parser::{parse_log, LogParseError};

// ── Skips ─────────────────────────────────────────────────────────────────────

/// Why a trial was left out of the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("malformed label: {0}")]
    LabelGrammar(#[from] LabelError),

    #[error(transparent)]
    Parse(#[from] LogParseError),

    #[error("measurement log not found: {}", .0.display())]
    MissingResource(PathBuf),

    #[error("cannot read {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("round {0} already ingested for this algorithm and condition")]
    DuplicateRound(u32),
}

impl SkipReason {
    /// Taxonomy name for reports.
    pub fn category(&self) -> &'static str {
        match self {
            SkipReason::LabelGrammar(_) => "LabelGrammarError",
            SkipReason::Parse(e) => e.category(),
            SkipReason::MissingResource(_) => "MissingResourceError",
            SkipReason::Unreadable { .. } => "ParseError",
            SkipReason::DuplicateRound(_) => "DuplicateTrial",
        }
    }
}

/// A trial that was not stored, with whatever is known about it.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTrial {
    pub label: String,
    /// `None` when the label itself could not be decoded.
    pub condition: Option<Condition>,
    pub reason: SkipReason,
}

// ── TrialStore ────────────────────────────────────────────────────────────────

/// Condition → algorithm → trials, each bucket ordered by round.
#[derive(Debug, Default)]
pub struct TrialStore {
    conditions: BTreeMap<Condition, BTreeMap<String, Vec<Trial>>>,
}

impl TrialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `label`, parse `raw_log` and store the trial.
    pub fn ingest(&mut self, label: &str, raw_log: &[u8]) -> Result<ConditionKey, SkippedTrial> {
        let parsed = parse_label(label).map_err(|e| skipped(label, None, e.into()))?;
        let records = parse_log(raw_log)
            .map_err(|e| skipped(label, Some(&parsed.key.condition), e.into()))?;
        self.insert(label, parsed.key, parsed.round, records)
    }

    /// Store a trial whose records were obtained elsewhere (e.g. a
    /// normalized table).
    ///
    /// Records are re-checked against the [`IntervalRecord::new`] invariants
    /// and invalid ones dropped; a list with nothing left is rejected.
    pub fn ingest_records(
        &mut self,
        label: &str,
        records: Vec<IntervalRecord>,
    ) -> Result<ConditionKey, SkippedTrial> {
        let parsed = parse_label(label).map_err(|e| skipped(label, None, e.into()))?;
        let supplied = records.len();
        let mut records: Vec<IntervalRecord> = records
            .into_iter()
            .filter_map(|r| IntervalRecord::new(r.start, r.end, r.throughput_mbps, r.retransmissions))
            .collect();
        if records.len() < supplied {
            debug!(
                "Dropped {} invalid records for {}",
                supplied - records.len(),
                label
            );
        }
        if records.is_empty() {
            return Err(skipped(
                label,
                Some(&parsed.key.condition),
                LogParseError::NoUsableIntervals(supplied).into(),
            ));
        }
        records.sort_by(|a, b| a.start.total_cmp(&b.start));
        self.insert(label, parsed.key, parsed.round, records)
    }

    fn insert(
        &mut self,
        label: &str,
        key: ConditionKey,
        round: u32,
        intervals: Vec<IntervalRecord>,
    ) -> Result<ConditionKey, SkippedTrial> {
        let bucket = self
            .conditions
            .entry(key.condition.clone())
            .or_default()
            .entry(key.algorithm.clone())
            .or_default();

        let pos = match bucket.binary_search_by_key(&round, |t| t.round) {
            Ok(_) => {
                return Err(skipped(
                    label,
                    Some(&key.condition),
                    SkipReason::DuplicateRound(round),
                ))
            }
            Err(pos) => pos,
        };

        bucket.insert(
            pos,
            Trial {
                key: key.clone(),
                round,
                label: label.to_string(),
                intervals,
            },
        );
        Ok(key)
    }

    /// All stored conditions in ascending order.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.keys()
    }

    /// Canonical algorithm names observed under `condition`.
    pub fn algorithms(&self, condition: &Condition) -> Vec<&str> {
        self.conditions
            .get(condition)
            .map(|algs| algs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Trials of `algorithm` (any case) under `condition`; empty when absent.
    pub fn trials(&self, condition: &Condition, algorithm: &str) -> &[Trial] {
        self.conditions
            .get(condition)
            .and_then(|algs| algs.get(&canonical_algorithm(algorithm)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every algorithm bucket under `condition`.
    pub fn group(&self, condition: &Condition) -> Option<&BTreeMap<String, Vec<Trial>>> {
        self.conditions.get(condition)
    }

    /// Every stored trial, ordered by condition, algorithm and round.
    pub fn iter_trials(&self) -> impl Iterator<Item = &Trial> {
        self.conditions
            .values()
            .flat_map(|algs| algs.values())
            .flatten()
    }

    /// Number of stored trials.
    pub fn len(&self) -> usize {
        self.iter_trials().count()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

fn skipped(label: &str, condition: Option<&Condition>, reason: SkipReason) -> SkippedTrial {
    SkippedTrial {
        label: label.to_string(),
        condition: condition.cloned(),
        reason,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
