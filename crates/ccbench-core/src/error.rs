use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a batch.
///
/// Per-trial problems never surface here; they are recorded as skips and the
/// batch carries on.
#[derive(Error, Debug)]
pub enum BenchError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The results root does not exist or is not a directory.
    #[error("Results path not found: {}", .0.display())]
    DataPathNotFound(PathBuf),

    /// An output file could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or produced.
    #[error("Failed to process JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A CSV table could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the ccbench crates.
pub type Result<T> = std::result::Result<T, BenchError>;
