//! Error types for audit-ledger

use thiserror::Error;

/// Errors that can occur while connecting to or preparing a backend
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Filesystem error while preparing a log directory
    #[error("Log directory unavailable: {0}")]
    Directory(#[from] std::io::Error),
}

impl From<surrealdb::Error> for LedgerError {
    fn from(err: surrealdb::Error) -> Self {
        LedgerError::Connection(err.to_string())
    }
}

/// Errors returned by [`crate::AuditLog`] operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The record could not be encoded for storage
    #[error("failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O failure in a file-backed log
    #[error("audit log io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure (database query, connection loss)
    #[error("audit backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
