//! Error types for registry-import
//!
//! Row-level problems are not errors in this sense: they are collected as
//! `RowIssue`s on the import session. `ImportError` covers everything the
//! pipeline does not handle itself (storage failures, corrupt stored data)
//! and always aborts the run.

use thiserror::Error;

/// Uncaught pipeline failure
#[derive(Debug, Error)]
pub enum ImportError {
    /// Database error from a store implementation
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// registry-common error (config, region lookup, session persistence)
    #[error("Common error: {0}")]
    Common(#[from] registry_common::Error),

    /// Upload file could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Stored row could not be decoded
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),
}

/// Result type for pipeline operations
pub type ImportResult<T> = Result<T, ImportError>;
