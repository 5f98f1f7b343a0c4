//! Error types for the duplicate detection engine

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by detection runs
///
/// Detection is best-effort for the caller: the report-creation workflow
/// that triggers it is expected to log these and continue.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Corrupt stored data (invalid UUID or JSON in a row)
    #[error("Internal error: {0}")]
    Internal(String),
}
