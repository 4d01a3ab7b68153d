//! Domain-level error taxonomy for Certitude.
//!
//! Classification failures are not errors; they are
//! [`UncertaintyHalt`](super::UncertaintyHalt) values. What remains here are
//! faults of the surrounding machinery.

use audit_ledger::{LedgerError, StorageError};

use crate::config::ConfigError;
use crate::validator::SchemaError;

/// Certitude errors.
#[derive(Debug, thiserror::Error)]
pub enum CertitudeError {
    #[error("audit store error: {0}")]
    Storage(#[from] StorageError),

    #[error("audit store setup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for Certitude operations.
pub type Result<T> = std::result::Result<T, CertitudeError>;
