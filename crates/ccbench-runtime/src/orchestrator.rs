//! Parallel per-condition aggregation.
//!
//! Conditions own disjoint trials and the store is read-only once ingestion
//! has finished, so every condition is aggregated as its own
//! `spawn_blocking` job. A semaphore bounds how many run at once and each
//! finished [`ConditionReport`] is sent through an `mpsc` channel as soon as
//! it is ready.

use std::sync::Arc;

use ccbench_core::models::Condition;
use ccbench_data::aggregator::{Aggregator, ConditionReport};
use ccbench_data::store::TrialStore;
use tokio::sync::{mpsc, Semaphore};

type ConditionJob = dyn Fn(&TrialStore, &Condition) -> ConditionReport + Send + Sync;

// ── AggregationOrchestrator ───────────────────────────────────────────────────

/// Background aggregation coordinator.
///
/// Call [`AggregationOrchestrator::start`] to dispatch one job per condition
/// and receive the reports in completion order.
pub struct AggregationOrchestrator {
    store: Arc<TrialStore>,
    /// Maximum number of conditions aggregated concurrently.
    workers: usize,
}

impl AggregationOrchestrator {
    /// Create a new orchestrator; `workers` is clamped to at least 1.
    pub fn new(store: Arc<TrialStore>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    /// Start aggregation.
    ///
    /// Returns the receiving end of the report channel, which closes once
    /// every condition has been handled, and a handle that aborts the
    /// dispatcher.
    pub fn start(self) -> (mpsc::Receiver<ConditionReport>, AggregationHandle) {
        self.start_with(Arc::new(|store: &TrialStore, condition: &Condition| {
            Aggregator::new(store).condition_report(condition)
        }))
    }

    fn start_with(self, job: Arc<ConditionJob>) -> (mpsc::Receiver<ConditionReport>, AggregationHandle) {
        let (tx, rx) = mpsc::channel(self.workers * 2);

        let handle = tokio::spawn(async move {
            self.dispatch(job, tx).await;
        });

        (rx, AggregationHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn dispatch(self, job: Arc<ConditionJob>, tx: mpsc::Sender<ConditionReport>) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let conditions: Vec<Condition> = self.store.conditions().cloned().collect();
        tracing::debug!(
            conditions = conditions.len(),
            workers = self.workers,
            "dispatching aggregation jobs"
        );

        let mut forwarders = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let store = Arc::clone(&self.store);
            let job = Arc::clone(&job);
            let tx = tx.clone();

            forwarders.push(tokio::spawn(async move {
                let key = condition.clone();
                let result = tokio::task::spawn_blocking(move || job(&*store, &key)).await;
                drop(permit);

                match result {
                    Ok(report) => {
                        if tx.send(report).await.is_err() {
                            tracing::debug!(%condition, "report receiver dropped");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%condition, error = %e, "aggregation job failed; condition dropped");
                    }
                }
            }));
        }

        for forwarder in forwarders {
            if let Err(e) = forwarder.await {
                tracing::warn!(error = %e, "report forwarder failed");
            }
        }
        tracing::debug!("aggregation dispatch finished");
    }
}

// ── AggregationHandle ─────────────────────────────────────────────────────────

/// A handle to the background dispatcher.
pub struct AggregationHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl AggregationHandle {
    /// Stop dispatching further conditions.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
