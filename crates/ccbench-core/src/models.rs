use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One timestamped throughput/retransmission sample within a trial.
///
/// Field names double as the header of the normalized per-trial table
/// (`start,end,throughput_mbps,retransmissions`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    /// Interval start, seconds since the beginning of the trial.
    pub start: f64,
    /// Interval end, seconds; always greater than `start`.
    pub end: f64,
    /// Average throughput over the interval in Mbit/s.
    pub throughput_mbps: f64,
    /// Retransmitted segments reported for the interval.
    pub retransmissions: u64,
}

impl IntervalRecord {
    /// Build a record, returning `None` when it would violate
    /// `end > start`, `start >= 0` or `throughput_mbps >= 0`.
    pub fn new(start: f64, end: f64, throughput_mbps: f64, retransmissions: u64) -> Option<Self> {
        let valid = start.is_finite()
            && end.is_finite()
            && throughput_mbps.is_finite()
            && start >= 0.0
            && end > start
            && throughput_mbps >= 0.0;
        valid.then_some(Self {
            start,
            end,
            throughput_mbps,
            retransmissions,
        })
    }

    /// Interval length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Data carried by the interval in megabytes (Mbit/s × s / 8).
    pub fn megabytes(&self) -> f64 {
        self.throughput_mbps * self.duration() / 8.0
    }
}

// ── Condition ─────────────────────────────────────────────────────────────────

/// Link condition of an experiment, independent of algorithm and round.
///
/// Ordered and hashed with `loss_percent` compared bit-wise, so it can key
/// a `BTreeMap` or `HashMap` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub bandwidth_mbps: u32,
    /// Opaque duration token such as `"20ms"`.
    pub delay: String,
    pub queue_depth: u32,
    pub loss_percent: f64,
}

impl Condition {
    fn cmp_fields(&self, other: &Self) -> Ordering {
        self.bandwidth_mbps
            .cmp(&other.bandwidth_mbps)
            .then_with(|| self.delay.cmp(&other.delay))
            .then_with(|| self.queue_depth.cmp(&other.queue_depth))
            .then_with(|| self.loss_percent.total_cmp(&other.loss_percent))
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_fields(other) == Ordering::Equal
    }
}

impl Eq for Condition {}

impl PartialOrd for Condition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Condition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_fields(other)
    }
}

impl Hash for Condition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bandwidth_mbps.hash(state);
        self.delay.hash(state);
        self.queue_depth.hash(state);
        self.loss_percent.to_bits().hash(state);
    }
}

impl fmt::Display for Condition {
    /// `bw<bandwidth>_d<delay>_q<queue>_l<loss>`, also used as the
    /// per-condition output directory name. Loss always keeps its decimal
    /// point (`l1.0`, `l0.5`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bw{}_d{}_q{}_l{:?}",
            self.bandwidth_mbps, self.delay, self.queue_depth, self.loss_percent
        )
    }
}

// ── ConditionKey ──────────────────────────────────────────────────────────────

/// Identifies one experiment configuration: algorithm plus link condition.
/// The repeat index is deliberately not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConditionKey {
    /// Canonical (upper-case) algorithm identifier.
    pub algorithm: String,
    #[serde(flatten)]
    pub condition: Condition,
}

impl ConditionKey {
    pub fn new(algorithm: &str, condition: Condition) -> Self {
        Self {
            algorithm: canonical_algorithm(algorithm),
            condition,
        }
    }

    /// Rebuild the trial directory label for `round`.
    pub fn label(&self, round: u32) -> String {
        let c = &self.condition;
        format!(
            "{}_bw{}_d{}_q{}_l{:?}_r{}",
            self.algorithm.to_lowercase(),
            c.bandwidth_mbps,
            c.delay,
            c.queue_depth,
            c.loss_percent,
            round
        )
    }
}

/// Canonical grouping form of an algorithm name: trimmed and upper-cased.
pub fn canonical_algorithm(name: &str) -> String {
    name.trim().to_uppercase()
}

// ── Trial ─────────────────────────────────────────────────────────────────────

/// One fully parsed run of a condition/algorithm pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub key: ConditionKey,
    pub round: u32,
    /// Identifier the trial was ingested under, original case preserved.
    pub label: String,
    /// Interval records ordered by `start`; never empty once stored.
    pub intervals: Vec<IntervalRecord>,
}

// ── Aggregated outputs ────────────────────────────────────────────────────────

/// Statistics for one whole-second time bin pooled across trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedStat {
    pub time_bin: f64,
    pub sample_count: usize,
    pub mean_throughput_mbps: f64,
    /// Sample standard deviation; `None` when `sample_count < 2`.
    pub std_throughput_mbps: Option<f64>,
    pub mean_retransmissions: f64,
}

/// Cross-trial scalar summary for one condition/algorithm pair.
///
/// Every statistic is `None` when no trial contributed a defined value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSummary {
    pub condition: Condition,
    pub algorithm: String,
    pub trial_count: usize,
    pub avg_throughput_mean: Option<f64>,
    pub avg_throughput_std: Option<f64>,
    pub retrans_per_mb_mean: Option<f64>,
    pub retrans_per_mb_std: Option<f64>,
}

impl ScalarSummary {
    /// Summary with every statistic undefined.
    pub fn empty(condition: Condition, algorithm: impl Into<String>) -> Self {
        Self {
            condition,
            algorithm: algorithm.into(),
            trial_count: 0,
            avg_throughput_mean: None,
            avg_throughput_std: None,
            retrans_per_mb_mean: None,
            retrans_per_mb_std: None,
        }
    }
}

/// Derived per-trial scalars feeding [`ScalarSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialMetrics {
    pub label: String,
    pub round: u32,
    pub avg_throughput: f64,
    pub total_retransmissions: u64,
    pub total_megabytes: f64,
    /// `None` when `total_megabytes` is not positive.
    pub retrans_per_mb: Option<f64>,
}

/// Per-algorithm figures pooled over every condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmOverview {
    pub algorithm: String,
    pub trial_count: usize,
    pub mean_throughput_mbps: Option<f64>,
    pub total_retransmissions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn condition(loss: f64) -> Condition {
        Condition {
            bandwidth_mbps: 50,
            delay: "20ms".to_string(),
            queue_depth: 100,
            loss_percent: loss,
        }
    }

    // ── IntervalRecord ────────────────────────────────────────────────────────

    #[test]
    fn test_interval_record_rejects_non_positive_duration() {
        assert!(IntervalRecord::new(1.0, 1.0, 10.0, 0).is_none());
        assert!(IntervalRecord::new(2.0, 1.0, 10.0, 0).is_none());
        assert!(IntervalRecord::new(0.0, 1.0, 10.0, 0).is_some());
    }

    #[test]
    fn test_interval_record_rejects_negative_or_nan() {
        assert!(IntervalRecord::new(0.0, 1.0, -1.0, 0).is_none());
        assert!(IntervalRecord::new(-0.5, 1.0, 1.0, 0).is_none());
        assert!(IntervalRecord::new(0.0, f64::NAN, 1.0, 0).is_none());
    }

    #[test]
    fn test_interval_megabytes() {
        let rec = IntervalRecord::new(0.0, 2.0, 8.0, 0).unwrap();
        assert!((rec.megabytes() - 2.0).abs() < 1e-12);
    }

    // ── Condition ─────────────────────────────────────────────────────────────

    #[test]
    fn test_condition_display() {
        assert_eq!(condition(1.0).to_string(), "bw50_d20ms_q100_l1.0");
        assert_eq!(condition(0.0).to_string(), "bw50_d20ms_q100_l0.0");
        assert_eq!(condition(0.5).to_string(), "bw50_d20ms_q100_l0.5");
    }

    #[test]
    fn test_condition_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(condition(1.0));
        set.insert(condition(1.0));
        set.insert(condition(0.0));
        assert_eq!(set.len(), 2);
        assert!(condition(0.0) < condition(1.0));
    }

    // ── ConditionKey ──────────────────────────────────────────────────────────

    #[test]
    fn test_condition_key_canonicalizes_algorithm() {
        let a = ConditionKey::new("reno", condition(0.0));
        let b = ConditionKey::new("RENO", condition(0.0));
        assert_eq!(a, b);
        assert_eq!(a.algorithm, "RENO");
    }

    #[test]
    fn test_condition_key_label() {
        let key = ConditionKey::new("cubic", condition(0.5));
        assert_eq!(key.label(3), "cubic_bw50_d20ms_q100_l0.5_r3");
        let key = ConditionKey::new("bbr", condition(1.0));
        assert_eq!(key.label(0), "bbr_bw50_d20ms_q100_l1.0_r0");
    }
}
