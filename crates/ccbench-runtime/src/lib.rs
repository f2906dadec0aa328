//! Runtime layer for ccbench.
//!
//! Runs per-condition aggregation on the tokio blocking pool and streams the
//! finished reports back to the caller.

pub mod orchestrator;

pub use ccbench_core as core;
pub use ccbench_data as data;
