use clap::Parser;
use std::path::PathBuf;

use crate::display::DisplayConfig;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Aggregate repeated congestion-control trials into per-condition summaries
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ccbench",
    about = "Aggregate repeated congestion-control trials into per-condition summaries",
    version
)]
pub struct Settings {
    /// Root directory holding one directory per trial
    #[arg(long, default_value = "results", env = "CCBENCH_RESULTS_DIR")]
    pub results_dir: PathBuf,

    /// Directory receiving the aggregated per-condition tables
    #[arg(long, default_value = "figures/summary")]
    pub output_dir: PathBuf,

    /// Raw measurement log file name inside each trial directory
    #[arg(long, default_value = "client.json")]
    pub log_name: String,

    /// Persist the normalized per-trial table under this directory
    #[arg(long)]
    pub normalized_dir: Option<PathBuf>,

    /// Display attributes file (defaults to ~/.ccbench/display.json)
    #[arg(long)]
    pub display_config: Option<PathBuf>,

    /// Write the default display attributes to the display config path
    #[arg(long)]
    pub write_display_config: bool,

    /// Maximum number of conditions aggregated concurrently (1-64)
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..=64))]
    pub workers: u16,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments and resolve derived values.
    pub fn load() -> Self {
        Self::parse().resolved()
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(args).resolved()
    }

    /// Path of the display attributes file actually in effect.
    pub fn display_config_path(&self) -> PathBuf {
        self.display_config
            .clone()
            .unwrap_or_else(DisplayConfig::default_path)
    }

    /// Apply the `--debug` override.
    fn resolved(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
