//! Audit-Ledger: append-only audit log for Certitude
//!
//! This crate provides the persistence layer behind the confidence gate and
//! retry orchestrator. Every classification, generator failure and success
//! becomes an immutable [`AuditRecord`] appended to one of three log streams.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append atomicity, chronological queries, durability.
//!
//! ## Key Components
//!
//! - `AuditLog`: backend-agnostic append + substring query contract
//! - `JsonlAuditLog`: JSON-lines files, one per log kind
//! - `SurrealAuditLog`: embedded SurrealDB (`mem://`, `surrealkv://`)
//! - `fakes::MemoryAuditLog`: in-memory store for tests

mod error;
pub mod fakes;
pub mod jsonl_log;
mod migrations;
pub mod storage_traits;
pub mod surreal_log;

pub use error::{LedgerError, StorageError};
pub use jsonl_log::JsonlAuditLog;
pub use storage_traits::{
    line_matches, AuditLog, AuditRecord, LogKind, OperationId, RecordBody, Severity,
    StorageResult,
};
pub use surreal_log::SurrealAuditLog;
