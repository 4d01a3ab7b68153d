//! SurrealDB schema initialization for the audit log
//!
//! Safe to call multiple times: re-running the definitions on an existing
//! database leaves the table and its records untouched.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::LedgerError;

/// Initialize the `audit_records` table.
///
/// Schema:
/// ```text
/// TABLE audit_records {
///   seq:          INT (unique, append order)
///   log_kind:     STRING (application | errors | uncertainty_halts)
///   operation_id: STRING?
///   body:         STRING (record serialized as one JSON line)
/// }
/// ```
///
/// Records are append-only: update and delete are denied.
pub async fn init_schema(db: &Surreal<Any>) -> Result<(), LedgerError> {
    debug!("Initializing audit_records table");

    let sql = r#"
        DEFINE TABLE audit_records
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        -- Global append order
        DEFINE INDEX idx_audit_seq ON TABLE audit_records COLUMNS seq UNIQUE;

        -- Per-stream queries
        DEFINE INDEX idx_audit_kind_seq ON TABLE audit_records COLUMNS log_kind, seq;

        -- Operation lookups
        DEFINE INDEX idx_audit_operation ON TABLE audit_records COLUMNS operation_id;
    "#;

    db.query(sql)
        .await
        .map_err(|e| LedgerError::SchemaSetup(e.to_string()))?;
    info!("audit_records table initialized");
    Ok(())
}
