//! In-memory fakes for the audit log (testing only)
//!
//! Provides `MemoryAuditLog`, which satisfies the `AuditLog` contract without
//! touching disk, and `FailingAuditLog`, which rejects every call.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryAuditLog
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoredRecord {
    kind: LogKind,
    line: String,
    record: AuditRecord,
}

/// In-memory audit log backed by a single `Vec` in append order.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all log kinds.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: &AuditRecord, kind: LogKind) -> StorageResult<()> {
        let line = record.to_line()?;
        let mut records = self.records.lock().unwrap();
        records.push(StoredRecord {
            kind,
            line,
            record: record.clone(),
        });
        Ok(())
    }

    async fn query(&self, needle: Option<&str>, kind: LogKind) -> StorageResult<Vec<AuditRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.kind == kind && line_matches(&r.line, needle))
            .map(|r| r.record.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FailingAuditLog
// ---------------------------------------------------------------------------

/// Audit log whose every operation fails with a backend error.
#[derive(Debug, Default)]
pub struct FailingAuditLog;

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _record: &AuditRecord, _kind: LogKind) -> StorageResult<()> {
        Err(StorageError::Backend("audit store unavailable".to_string()))
    }

    async fn query(
        &self,
        _needle: Option<&str>,
        _kind: LogKind,
    ) -> StorageResult<Vec<AuditRecord>> {
        Err(StorageError::Backend("audit store unavailable".to_string()))
    }
}
