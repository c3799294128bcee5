use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// All errors produced while ingesting Kindle logs.
#[derive(Error, Debug)]
pub enum KindleError {
    /// A log file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A log file contained no line with a parseable timestamp.
    #[error("No valid lines in file {0}")]
    NoValidLines(PathBuf),

    /// Timestamp normalisation cannot make progress.
    #[error("{line}@{file}: clock model violated ({previous} -> {current}): {detail}")]
    ClockModel {
        file: String,
        line: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
        detail: String,
    },

    /// Book events went backwards in time while merging files.
    #[error("{asin}: Going backwards in time from {last} => {next}")]
    BackwardsEvents {
        asin: String,
        last: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    /// An existing checkpoint could not be decoded.
    #[error("Could not load history from {path}: {source}")]
    CheckpointCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A checkpoint could not be written.
    #[error("Could not store history to {path}: {source}")]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timezone name or offset is not recognised.
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl KindleError {
    /// `true` when the error only disqualifies the file being processed.
    ///
    /// Everything else aborts the run before the checkpoint is written.
    pub fn is_file_fatal(&self) -> bool {
        matches!(
            self,
            KindleError::FileRead { .. } | KindleError::NoValidLines(_)
        )
    }
}

/// Convenience alias used throughout the kindle crates.
pub type Result<T> = std::result::Result<T, KindleError>;
