//! Error types for trial-tracker
//!
//! Only construction can fail hard. Everything the reporter touches on disk
//! is recoverable and surfaces as a logged warning instead of an `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trial-tracker error types
#[derive(Error, Debug)]
pub enum Error {
    /// Tracker configuration rejected by `TrackerConfig::validate`
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    /// No async runtime to host the reporter task
    #[error("Background reporter unavailable: {0}\nConstruct the tracker from within a Tokio runtime")]
    RuntimeUnavailable(String),

    /// Checkpoint exists but cannot be interpreted
    #[error("Malformed checkpoint at {}: {reason}", path.display())]
    MalformedCheckpoint {
        /// Checkpoint file path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Metrics log line that does not follow the log format
    #[error("Malformed metrics record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number within the log
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
