//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures from the storage and cache crates are raised
//! into [`Storage`](ErrorKind::Storage) and [`Cache`](ErrorKind::Cache), so
//! the original error stays in the tree.

use derive_more::{Display, Error};
use hoard_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};
use std::path::PathBuf;
use uuid::Uuid;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, from the caller's point of view.
///
/// ### Caller Errors
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::FileNotFound`]
/// - [`ErrorKind::Validation`]
/// - [`ErrorKind::Cancelled`]
/// - [`ErrorKind::SourceChanged`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Cache`]
/// - [`ErrorKind::Template`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source file (or record) does not exist. Nothing was changed.
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// No file record has this id.
    #[display("file record not found: {_0}")]
    FileNotFound(#[error(not(source))] Uuid),
    /// The input was rejected before anything was written.
    #[display("validation failed: {_0}")]
    Validation(#[error(not(source))] String),
    /// Reading, writing, moving or deleting a physical file failed.
    #[display("storage error")]
    Storage,
    /// The metadata store failed.
    #[display("metadata store error")]
    Cache,
    /// The date template could not be compiled or rendered.
    #[display("issue with path generation from template")]
    Template,
    /// The operation was cancelled; no partial file or record remains.
    #[display("operation cancelled")]
    Cancelled,
    /// The source was modified between hashing and staging. Nothing was
    /// stored.
    #[display("source changed while it was being stored: {}", _0.display())]
    SourceChanged(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Cache | Self::SourceChanged(_))
    }
}

/// Raise a storage error into the library's kind, keeping cancellation and
/// missing files distinguishable.
pub(crate) fn from_storage(err: StorageError) -> Error {
    let kind = match &*err {
        StorageErrorKind::Cancelled => ErrorKind::Cancelled,
        StorageErrorKind::NotFound(path) => ErrorKind::NotFound(path.clone()),
        _ => ErrorKind::Storage,
    };
    err.raise(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_cancellation_stays_cancellation() {
        let err = from_storage(exn::Exn::from(StorageErrorKind::Cancelled));
        assert!(matches!(&*err, ErrorKind::Cancelled));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_storage_failure_is_retryable() {
        let io = std::io::Error::other("disk on fire");
        let err = from_storage(exn::Exn::from(StorageErrorKind::Io(io)));
        assert!(matches!(&*err, ErrorKind::Storage));
        assert!(err.is_retryable());
    }
}
