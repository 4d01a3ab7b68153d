//! Audit trail: routes records to log streams and mirrors them to tracing.
//!
//! Routing:
//! - `INFO`/`WARN` lines → application
//! - `ERROR` lines → errors + application
//! - uncertainty halts → uncertainty_halts + application
//! - successes → application

use std::sync::Arc;

use audit_ledger::{AuditLog, AuditRecord, LogKind, OperationId, RecordBody, Severity, StorageResult};
use serde_json::Value;

use crate::telemetry::AUDIT_TARGET;

/// Default number of halt records returned by [`AuditTrail::uncertainty_halts`].
pub const DEFAULT_HALT_LIMIT: usize = 50;

/// Handle onto the durable audit log. Cheap to clone.
#[derive(Clone)]
pub struct AuditTrail {
    log: Arc<dyn AuditLog>,
    console_echo: bool,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("console_echo", &self.console_echo)
            .finish_non_exhaustive()
    }
}

impl AuditTrail {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self {
            log,
            console_echo: true,
        }
    }

    /// Toggle mirroring of records as tracing events.
    pub fn with_console_echo(mut self, enabled: bool) -> Self {
        self.console_echo = enabled;
        self
    }

    pub fn log_store(&self) -> &Arc<dyn AuditLog> {
        &self.log
    }

    /// Append a record to every stream its kind routes to.
    pub async fn record(&self, record: AuditRecord) -> StorageResult<()> {
        self.echo(&record);
        match (&record.body, record.level) {
            (RecordBody::UncertaintyHalt { .. }, _) => {
                self.log.append(&record, LogKind::UncertaintyHalts).await?;
            }
            (RecordBody::Log { .. }, Severity::Error) => {
                self.log.append(&record, LogKind::Errors).await?;
            }
            _ => {}
        }
        self.log.append(&record, LogKind::Application).await
    }

    pub async fn info(
        &self,
        message: impl Into<String>,
        operation_id: Option<&OperationId>,
        metadata: Value,
    ) -> StorageResult<()> {
        self.record(AuditRecord::log(
            Severity::Info,
            message,
            operation_id.cloned(),
            metadata,
        ))
        .await
    }

    pub async fn warn(
        &self,
        message: impl Into<String>,
        operation_id: Option<&OperationId>,
        metadata: Value,
    ) -> StorageResult<()> {
        self.record(AuditRecord::log(
            Severity::Warn,
            message,
            operation_id.cloned(),
            metadata,
        ))
        .await
    }

    pub async fn error(
        &self,
        message: impl Into<String>,
        operation_id: Option<&OperationId>,
        metadata: Value,
    ) -> StorageResult<()> {
        self.record(AuditRecord::log(
            Severity::Error,
            message,
            operation_id.cloned(),
            metadata,
        ))
        .await
    }

    pub async fn uncertainty_halt(
        &self,
        operation_id: &OperationId,
        reason: impl Into<String>,
        raw_response: Option<String>,
        context: Value,
        source: &str,
    ) -> StorageResult<()> {
        self.record(AuditRecord::uncertainty_halt(
            operation_id.clone(),
            reason,
            raw_response,
            context,
            source,
        ))
        .await
    }

    pub async fn success(
        &self,
        operation_id: &OperationId,
        context: Value,
        source: &str,
    ) -> StorageResult<()> {
        self.record(AuditRecord::success(operation_id.clone(), context, source))
            .await
    }

    /// Case-insensitive substring search over one stream, oldest first.
    pub async fn search(&self, query: Option<&str>, kind: LogKind) -> StorageResult<Vec<AuditRecord>> {
        self.log.query(query, kind).await
    }

    /// Most recent halt records, oldest first.
    pub async fn uncertainty_halts(&self, limit: usize) -> StorageResult<Vec<AuditRecord>> {
        self.log.tail(LogKind::UncertaintyHalts, limit).await
    }

    /// Application records belonging to one operation, in append order.
    pub async fn records_for_operation(
        &self,
        operation_id: &OperationId,
    ) -> StorageResult<Vec<AuditRecord>> {
        let records = self
            .log
            .query(Some(operation_id.as_str()), LogKind::Application)
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.operation_id.as_ref() == Some(operation_id))
            .collect())
    }

    fn echo(&self, record: &AuditRecord) {
        if !self.console_echo {
            return;
        }
        let op = record.operation_id.as_ref().map(OperationId::as_str).unwrap_or("-");
        match &record.body {
            RecordBody::Log { message, .. } => match record.level {
                Severity::Info => tracing::info!(target: AUDIT_TARGET, operation_id = %op, "{message}"),
                Severity::Warn => tracing::warn!(target: AUDIT_TARGET, operation_id = %op, "{message}"),
                Severity::Error => tracing::error!(target: AUDIT_TARGET, operation_id = %op, "{message}"),
            },
            RecordBody::UncertaintyHalt { reason, source, .. } => {
                tracing::error!(
                    target: AUDIT_TARGET,
                    operation_id = %op,
                    source = %source,
                    "UNCERTAINTY HALT: {reason}"
                );
            }
            RecordBody::Success { source, .. } => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    operation_id = %op,
                    source = %source,
                    "SUCCESS"
                );
            }
        }
    }
}
