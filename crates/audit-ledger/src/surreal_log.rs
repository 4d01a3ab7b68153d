//! SurrealDB-backed AuditLog implementation
//!
//! Records are stored as one JSON line per row in `audit_records`, with a
//! process-assigned `seq` giving the append order that queries sort by.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{LedgerError, StorageError};
use crate::migrations;
use crate::storage_traits::{line_matches, AuditLog, AuditRecord, LogKind, StorageResult};

const NAMESPACE: &str = "certitude";
const DATABASE: &str = "audit";
const DEFAULT_LOCAL_PATH: &str = ".certitude/db";

/// Database row for one audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditRow {
    /// SurrealDB record ID
    id: Option<surrealdb::sql::Thing>,
    seq: u64,
    log_kind: String,
    operation_id: Option<String>,
    body: String,
}

#[derive(Debug, Deserialize)]
struct SeqRow {
    seq: u64,
}

/// SurrealDB-backed implementation of [`AuditLog`].
pub struct SurrealAuditLog {
    db: Surreal<Any>,
    next_seq: AtomicU64,
}

impl SurrealAuditLog {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`, `ws://host`).
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        let next_seq = Self::load_next_seq(&db).await?;

        info!(url = %url, next_seq, "SurrealAuditLog connected");
        Ok(Self {
            db,
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Connect using `SURREALDB_URL`, falling back to local persistence in
    /// `.certitude/db`.
    pub async fn from_env() -> Result<Self, LedgerError> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        std::fs::create_dir_all(DEFAULT_LOCAL_PATH).map_err(|e| {
            LedgerError::Connection(format!(
                "Failed to create database directory {DEFAULT_LOCAL_PATH}: {e}"
            ))
        })?;
        let url = format!("surrealkv://{DEFAULT_LOCAL_PATH}");
        info!("No SURREALDB_URL found, using local persistence: {}", url);
        Self::connect(&url).await
    }

    async fn load_next_seq(db: &Surreal<Any>) -> Result<u64, LedgerError> {
        let mut res = db
            .query("SELECT seq FROM audit_records ORDER BY seq DESC LIMIT 1")
            .await?;
        let rows: Vec<SeqRow> = res.take(0)?;
        Ok(rows.first().map(|r| r.seq + 1).unwrap_or(1))
    }
}

#[async_trait]
impl AuditLog for SurrealAuditLog {
    async fn append(&self, record: &AuditRecord, kind: LogKind) -> StorageResult<()> {
        let row = AuditRow {
            id: None,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            log_kind: kind.as_str().to_string(),
            operation_id: record.operation_id.as_ref().map(|id| id.to_string()),
            body: record.to_line()?,
        };

        debug!(seq = row.seq, kind = %kind, "appending audit record");

        let _created: Option<AuditRow> = self
            .db
            .create("audit_records")
            .content(row)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, needle: Option<&str>, kind: LogKind) -> StorageResult<Vec<AuditRecord>> {
        let kind_owned = kind.as_str().to_string();
        let mut res = self
            .db
            .query("SELECT * FROM audit_records WHERE log_kind = $kind ORDER BY seq ASC")
            .bind(("kind", kind_owned))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .filter(|row| line_matches(&row.body, needle))
            .map(|row| serde_json::from_str(&row.body).map_err(StorageError::from))
            .collect()
    }
}
