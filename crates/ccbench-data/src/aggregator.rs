//! Cross-trial statistics per condition and algorithm.
//!
//! Two read-only queries run over a [`ConditionGroup`]: a per-second time
//! series pooled across every trial, and a scalar summary of per-trial
//! averages. Neither fails; an absent or empty bucket yields zero bins and
//! an all-undefined summary.

use std::collections::BTreeMap;

use ccbench_core::models::{
    canonical_algorithm, AlgorithmOverview, BinnedStat, Condition, IntervalRecord, ScalarSummary,
    Trial, TrialMetrics,
};
use ccbench_core::stats::{defined_mean_std, mean, round_half_even, sample_std};

use crate::store::TrialStore;

// ── ConditionGroup ────────────────────────────────────────────────────────────

/// Borrowed view of every algorithm bucket under one condition.
#[derive(Debug, Clone)]
pub struct ConditionGroup<'a> {
    pub condition: Condition,
    pub trials_by_algorithm: BTreeMap<&'a str, &'a [Trial]>,
}

impl<'a> ConditionGroup<'a> {
    /// Trials of `algorithm` (any case); empty when absent.
    pub fn trials(&self, algorithm: &str) -> &'a [Trial] {
        self.trials_by_algorithm
            .get(canonical_algorithm(algorithm).as_str())
            .copied()
            .unwrap_or(&[])
    }

    pub fn trial_count(&self) -> usize {
        self.trials_by_algorithm.values().map(|t| t.len()).sum()
    }
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// Everything computed for one algorithm under one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmReport {
    pub algorithm: String,
    pub time_series: Vec<BinnedStat>,
    pub summary: ScalarSummary,
    pub trials: Vec<TrialMetrics>,
}

/// Aggregated output for one condition, one entry per observed algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionReport {
    pub condition: Condition,
    pub algorithms: Vec<AlgorithmReport>,
}

// ── BinAccumulator ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BinAccumulator {
    throughputs: Vec<f64>,
    retransmissions: u64,
}

impl BinAccumulator {
    fn add(&mut self, record: &IntervalRecord) {
        self.throughputs.push(record.throughput_mbps);
        self.retransmissions = self.retransmissions.saturating_add(record.retransmissions);
    }

    fn finish(self, time_bin: i64) -> BinnedStat {
        let count = self.throughputs.len();
        BinnedStat {
            time_bin: time_bin as f64,
            sample_count: count,
            mean_throughput_mbps: mean(&self.throughputs).unwrap_or_default(),
            std_throughput_mbps: sample_std(&self.throughputs),
            mean_retransmissions: self.retransmissions as f64 / count as f64,
        }
    }
}

/// Pool `records` into whole-second bins keyed by `end` rounded half to even.
///
/// Bins are ascending and only bins holding at least one record appear.
pub fn bin_records<'r>(records: impl IntoIterator<Item = &'r IntervalRecord>) -> Vec<BinnedStat> {
    let mut bins: BTreeMap<i64, BinAccumulator> = BTreeMap::new();
    for record in records {
        let key = round_half_even(record.end) as i64;
        bins.entry(key).or_default().add(record);
    }
    bins.into_iter()
        .map(|(time_bin, acc)| acc.finish(time_bin))
        .collect()
}

/// Per-trial scalars: average throughput, retransmission total, data volume
/// and retransmissions per megabyte.
pub fn trial_metrics(trial: &Trial) -> TrialMetrics {
    let throughputs: Vec<f64> = trial.intervals.iter().map(|r| r.throughput_mbps).collect();
    let total_retransmissions = trial
        .intervals
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.retransmissions));
    let total_megabytes: f64 = trial.intervals.iter().map(IntervalRecord::megabytes).sum();

    let retrans_per_mb =
        (total_megabytes > 0.0).then(|| total_retransmissions as f64 / total_megabytes);

    TrialMetrics {
        label: trial.label.clone(),
        round: trial.round,
        avg_throughput: mean(&throughputs).unwrap_or(f64::NAN),
        total_retransmissions,
        total_megabytes,
        retrans_per_mb,
    }
}

/// Reduce per-trial metrics to the cross-trial summary.
fn summarize(condition: &Condition, algorithm: &str, metrics: &[TrialMetrics]) -> ScalarSummary {
    let throughput: Vec<Option<f64>> = metrics.iter().map(|m| Some(m.avg_throughput)).collect();
    let rates: Vec<Option<f64>> = metrics.iter().map(|m| m.retrans_per_mb).collect();

    let (avg_throughput_mean, avg_throughput_std) = defined_mean_std(&throughput);
    let (retrans_per_mb_mean, retrans_per_mb_std) = defined_mean_std(&rates);

    ScalarSummary {
        condition: condition.clone(),
        algorithm: canonical_algorithm(algorithm),
        trial_count: metrics.len(),
        avg_throughput_mean,
        avg_throughput_std,
        retrans_per_mb_mean,
        retrans_per_mb_std,
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Read-only query front-end over a [`TrialStore`].
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    store: &'a TrialStore,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a TrialStore) -> Self {
        Self { store }
    }

    /// Build the view of `condition`; empty when nothing was ingested for it.
    pub fn group(&self, condition: &Condition) -> ConditionGroup<'a> {
        let trials_by_algorithm = self
            .store
            .group(condition)
            .map(|algs| {
                algs.iter()
                    .map(|(alg, trials)| (alg.as_str(), trials.as_slice()))
                    .collect()
            })
            .unwrap_or_default();
        ConditionGroup {
            condition: condition.clone(),
            trials_by_algorithm,
        }
    }

    /// Per-second statistics pooled over every trial of `algorithm`.
    pub fn time_series(&self, condition: &Condition, algorithm: &str) -> Vec<BinnedStat> {
        let trials = self.store.trials(condition, algorithm);
        bin_records(trials.iter().flat_map(|t| t.intervals.iter()))
    }

    /// Cross-trial summary for `algorithm` under `condition`.
    pub fn scalar_summary(&self, condition: &Condition, algorithm: &str) -> ScalarSummary {
        let metrics: Vec<TrialMetrics> = self
            .store
            .trials(condition, algorithm)
            .iter()
            .map(trial_metrics)
            .collect();
        summarize(condition, algorithm, &metrics)
    }

    /// Both queries for every algorithm observed under `condition`.
    pub fn condition_report(&self, condition: &Condition) -> ConditionReport {
        let group = self.group(condition);
        let algorithms = group
            .trials_by_algorithm
            .iter()
            .map(|(algorithm, trials)| {
                let metrics: Vec<TrialMetrics> = trials.iter().map(trial_metrics).collect();
                AlgorithmReport {
                    algorithm: algorithm.to_string(),
                    time_series: bin_records(trials.iter().flat_map(|t| t.intervals.iter())),
                    summary: summarize(condition, algorithm, &metrics),
                    trials: metrics,
                }
            })
            .collect();
        ConditionReport {
            condition: condition.clone(),
            algorithms,
        }
    }

    /// Per-algorithm throughput mean over all pooled records and total
    /// retransmissions, across every condition.
    pub fn algorithm_overview(&self) -> Vec<AlgorithmOverview> {
        #[derive(Default)]
        struct Pool {
            trials: usize,
            throughputs: Vec<f64>,
            retransmissions: u64,
        }

        let mut pools: BTreeMap<&str, Pool> = BTreeMap::new();
        for trial in self.store.iter_trials() {
            let pool = pools.entry(trial.key.algorithm.as_str()).or_default();
            pool.trials += 1;
            for record in &trial.intervals {
                pool.throughputs.push(record.throughput_mbps);
                pool.retransmissions = pool.retransmissions.saturating_add(record.retransmissions);
            }
        }

        pools
            .into_iter()
            .map(|(algorithm, pool)| AlgorithmOverview {
                algorithm: algorithm.to_string(),
                trial_count: pool.trials,
                mean_throughput_mbps: mean(&pool.throughputs),
                total_retransmissions: pool.retransmissions,
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_log(intervals: &[(f64, f64, f64, u64)]) -> Vec<u8> {
        let intervals: Vec<_> = intervals
            .iter()
            .map(|(s, e, mbps, r)| {
                json!({"sum": {"start": s, "end": e, "bits_per_second": mbps * 1e6, "retransmits": r}})
            })
            .collect();
        serde_json::to_vec(&json!({ "intervals": intervals })).unwrap()
    }

    fn cond() -> Condition {
        Condition {
            bandwidth_mbps: 50,
            delay: "20ms".to_string(),
            queue_depth: 100,
            loss_percent: 1.0,
        }
    }

    fn record(start: f64, end: f64, mbps: f64, retrans: u64) -> IntervalRecord {
        IntervalRecord::new(start, end, mbps, retrans).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-5
    }

    /// Two CUBIC trials from the reference binning example.
    fn reference_store() -> TrialStore {
        let mut store = TrialStore::new();
        store
            .ingest(
                "cubic_bw50_d20ms_q100_l1.0_r0",
                &raw_log(&[(0.0, 1.0, 100.0, 2), (1.0, 2.0, 102.0, 3)]),
            )
            .unwrap();
        store
            .ingest(
                "cubic_bw50_d20ms_q100_l1.0_r1",
                &raw_log(&[(0.0, 1.0, 98.0, 1), (1.0, 2.0, 101.0, 0)]),
            )
            .unwrap();
        store
    }

    // ── time_series ───────────────────────────────────────────────────────────

    #[test]
    fn test_time_series_reference_bins() {
        let store = reference_store();
        let bins = Aggregator::new(&store).time_series(&cond(), "cubic");

        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].time_bin, 1.0);
        assert_eq!(bins[0].sample_count, 2);
        assert!(approx(bins[0].mean_throughput_mbps, 99.0));
        assert!(approx(bins[0].std_throughput_mbps.unwrap(), 1.41421));
        assert!(approx(bins[0].mean_retransmissions, 1.5));

        assert_eq!(bins[1].time_bin, 2.0);
        assert!(approx(bins[1].mean_throughput_mbps, 101.5));
        assert!(approx(bins[1].std_throughput_mbps.unwrap(), 0.70711));
        assert!(approx(bins[1].mean_retransmissions, 1.5));
    }

    #[test]
    fn test_single_sample_bin_has_undefined_std() {
        let bins = bin_records(&[record(0.0, 1.0, 50.0, 4)]);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].sample_count, 1);
        assert_eq!(bins[0].std_throughput_mbps, None);
        assert_eq!(bins[0].mean_retransmissions, 4.0);
    }

    #[test]
    fn test_bins_use_half_even_rounding_and_skip_gaps() {
        let records = [
            record(0.0, 0.5, 1.0, 0),  // bin 0
            record(0.5, 1.5, 2.0, 0),  // bin 2
            record(1.5, 2.5, 3.0, 0),  // bin 2
            record(9.0, 10.2, 4.0, 0), // bin 10
        ];
        let bins = bin_records(&records);
        let keys: Vec<f64> = bins.iter().map(|b| b.time_bin).collect();
        assert_eq!(keys, vec![0.0, 2.0, 10.0]);
        assert_eq!(bins[1].sample_count, 2);
    }

    #[test]
    fn test_bins_sorted_regardless_of_input_order() {
        let records = [record(2.0, 3.0, 1.0, 0), record(0.0, 1.0, 1.0, 0)];
        let keys: Vec<f64> = bin_records(&records).iter().map(|b| b.time_bin).collect();
        assert_eq!(keys, vec![1.0, 3.0]);
    }

    #[test]
    fn test_time_series_absent_bucket_is_empty() {
        let store = reference_store();
        let agg = Aggregator::new(&store);
        assert!(agg.time_series(&cond(), "bbr").is_empty());

        let other = Condition {
            bandwidth_mbps: 10,
            ..cond()
        };
        assert!(agg.time_series(&other, "cubic").is_empty());
    }

    // ── scalar_summary ────────────────────────────────────────────────────────

    #[test]
    fn test_scalar_summary_reference() {
        let store = reference_store();
        let summary = Aggregator::new(&store).scalar_summary(&cond(), "CUBIC");

        assert_eq!(summary.algorithm, "CUBIC");
        assert_eq!(summary.trial_count, 2);
        // Per-trial averages 101.0 and 99.5.
        assert!(approx(summary.avg_throughput_mean.unwrap(), 100.25));
        assert!(approx(summary.avg_throughput_std.unwrap(), 0.75));
        // 5 / 25.25 and 1 / 24.875 retransmissions per MB.
        let r0 = 5.0 / 25.25;
        let r1 = 1.0 / 24.875;
        assert!(approx(summary.retrans_per_mb_mean.unwrap(), (r0 + r1) / 2.0));
        assert!(approx(summary.retrans_per_mb_std.unwrap(), (r0 - r1).abs() / 2.0));
    }

    #[test]
    fn test_zero_data_trial_excluded_from_rate_average() {
        let mut store = TrialStore::new();
        // No data moved: the rate is undefined for this trial.
        store
            .ingest(
                "reno_bw50_d20ms_q100_l1.0_r0",
                &raw_log(&[(0.0, 1.0, 0.0, 3)]),
            )
            .unwrap();
        // 8 Mbit/s for 1 s = 1 MB with 5 retransmissions.
        store
            .ingest(
                "reno_bw50_d20ms_q100_l1.0_r1",
                &raw_log(&[(0.0, 1.0, 8.0, 5)]),
            )
            .unwrap();

        let summary = Aggregator::new(&store).scalar_summary(&cond(), "reno");
        assert_eq!(summary.retrans_per_mb_mean, Some(5.0));
        assert_eq!(summary.retrans_per_mb_std, Some(0.0));
        assert_eq!(summary.avg_throughput_mean, Some(4.0));
    }

    #[test]
    fn test_all_rates_undefined_stay_undefined() {
        let mut store = TrialStore::new();
        store
            .ingest(
                "reno_bw50_d20ms_q100_l1.0_r0",
                &raw_log(&[(0.0, 1.0, 0.0, 3)]),
            )
            .unwrap();

        let summary = Aggregator::new(&store).scalar_summary(&cond(), "reno");
        assert_eq!(summary.retrans_per_mb_mean, None);
        assert_eq!(summary.retrans_per_mb_std, None);
        assert_eq!(summary.avg_throughput_mean, Some(0.0));
    }

    #[test]
    fn test_scalar_summary_absent_bucket_is_all_undefined() {
        let store = TrialStore::new();
        let summary = Aggregator::new(&store).scalar_summary(&cond(), "bbr");
        assert_eq!(summary, ScalarSummary::empty(cond(), "BBR"));
    }

    #[test]
    fn test_trial_metrics() {
        let trial = Trial {
            key: ccbench_core::models::ConditionKey::new("bbr", cond()),
            round: 2,
            label: "bbr_bw50_d20ms_q100_l1.0_r2".to_string(),
            intervals: vec![record(0.0, 0.5, 16.0, 1), record(0.5, 1.5, 8.0, 1)],
        };
        let metrics = trial_metrics(&trial);
        assert_eq!(metrics.total_retransmissions, 2);
        assert!(approx(metrics.total_megabytes, 2.0));
        assert_eq!(metrics.retrans_per_mb, Some(1.0));
        assert_eq!(metrics.avg_throughput, 12.0);
    }

    #[test]
    fn test_huge_retransmission_counts_saturate() {
        let mut store = TrialStore::new();
        let records = vec![
            record(0.0, 1.0, 8.0, u64::MAX),
            record(1.0, 2.0, 8.0, u64::MAX),
        ];
        store
            .ingest_records("cubic_bw50_d20ms_q100_l1.0_r0", records)
            .unwrap();
        let agg = Aggregator::new(&store);

        let bins = agg.time_series(&cond(), "cubic");
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].mean_retransmissions, u64::MAX as f64);

        let trial = &store.trials(&cond(), "cubic")[0];
        assert_eq!(trial_metrics(trial).total_retransmissions, u64::MAX);
        assert!(agg.scalar_summary(&cond(), "cubic").retrans_per_mb_mean.is_some());

        let overview = agg.algorithm_overview();
        assert_eq!(overview[0].total_retransmissions, u64::MAX);
    }

    // ── group / report / overview ─────────────────────────────────────────────

    #[test]
    fn test_group_lists_algorithms() {
        let mut store = reference_store();
        store
            .ingest(
                "BBR_bw50_d20ms_q100_l1.0_r0",
                &raw_log(&[(0.0, 1.0, 40.0, 0)]),
            )
            .unwrap();

        let group = Aggregator::new(&store).group(&cond());
        let algs: Vec<&str> = group.trials_by_algorithm.keys().copied().collect();
        assert_eq!(algs, vec!["BBR", "CUBIC"]);
        assert_eq!(group.trials("cubic").len(), 2);
        assert_eq!(group.trial_count(), 3);
    }

    #[test]
    fn test_condition_report_matches_individual_queries() {
        let store = reference_store();
        let agg = Aggregator::new(&store);
        let report = agg.condition_report(&cond());

        assert_eq!(report.algorithms.len(), 1);
        let cubic = &report.algorithms[0];
        assert_eq!(cubic.time_series, agg.time_series(&cond(), "cubic"));
        assert_eq!(cubic.summary, agg.scalar_summary(&cond(), "cubic"));
        assert_eq!(cubic.trials.len(), 2);
    }

    #[test]
    fn test_condition_report_for_unknown_condition_is_empty() {
        let store = reference_store();
        let other = Condition {
            queue_depth: 1,
            ..cond()
        };
        let report = Aggregator::new(&store).condition_report(&other);
        assert!(report.algorithms.is_empty());
    }

    #[test]
    fn test_algorithm_overview_pools_conditions() {
        let mut store = reference_store();
        store
            .ingest(
                "cubic_bw10_d20ms_q100_l0_r0",
                &raw_log(&[(0.0, 1.0, 9.0, 7)]),
            )
            .unwrap();

        let overview = Aggregator::new(&store).algorithm_overview();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].algorithm, "CUBIC");
        assert_eq!(overview[0].trial_count, 3);
        assert_eq!(overview[0].total_retransmissions, 13);
        // (100 + 102 + 98 + 101 + 9) / 5
        assert!(approx(overview[0].mean_throughput_mbps.unwrap(), 82.0));
    }
}
