//! Domain types, label decoding and statistics shared by the ccbench crates.

pub mod display;
pub mod error;
pub mod label;
pub mod models;
pub mod settings;
pub mod stats;
