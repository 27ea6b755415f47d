//! Error types for the shard merge subsystem

use thiserror::Error;

/// Result type alias for merge operations
pub type MergeResult<T> = std::result::Result<T, MergeError>;

/// Errors that can occur while configuring or feeding a merge
#[derive(Debug, Error)]
pub enum MergeError {
    /// Page window or re-rank parameters are unusable (negative, overflowing)
    #[error("Invalid merge configuration: {0}")]
    InvalidConfig(String),

    /// A sort clause could not be parsed
    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    /// `add_document` was called after draining started
    #[error("Merge ingest closed: documents cannot be added once draining has started")]
    IngestClosed,
}

impl MergeError {
    /// Returns the error type string (for JSON responses)
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidSort(_) => "INVALID_SORT",
            Self::IngestClosed => "INGEST_CLOSED",
        }
    }
}
