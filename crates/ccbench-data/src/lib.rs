//! Data layer for ccbench.
//!
//! Discovers trial directories, parses raw measurement logs into interval
//! records, stores trials by condition, aggregates them into time series and
//! summaries, and hands the results to a rendering sink.

pub mod aggregator;
pub mod analysis;
pub mod exporter;
pub mod log_parser;
pub mod reader;
pub mod store;

pub use ccbench_core as core;
