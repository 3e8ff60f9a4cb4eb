//! Cache Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use uuid::Uuid;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("folder not found: {_0}")]
    FolderNotFound(#[error(not(source))] Uuid),
    #[display("file not found: {_0}")]
    FileNotFound(#[error(not(source))] Uuid),
    /// Another folder already has this path.
    #[display("folder already exists: {_0}")]
    FolderExists(#[error(not(source))] String),
    /// A file with this content hash is already recorded. The caller should
    /// treat the existing record as the canonical copy.
    #[display("content already recorded: {_0}")]
    DuplicateHash(#[error(not(source))] String),
    #[display("invalid folder name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// A folder cannot be moved beneath itself.
    #[display("folder move would create a cycle")]
    Cycle,
    /// Serialization/deserialization error.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY surfaces as a plain database error.
        matches!(self, Self::Database)
    }
}

/// Whether a database error was caused by a `UNIQUE` constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
