//! Audit log trait and record model.
//!
//! - `AuditRecord`: an immutable fact (log line, uncertainty halt, success)
//! - `LogKind`: which log stream a record is appended to
//! - `AuditLog`: append + substring query, backend-agnostic
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifier joining every audit record of one logical operation.
///
/// Generated once when an operation starts and reused across all of its
/// retry attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a new random operation id (`op-<uuid>`).
    pub fn new() -> Self {
        OperationId(format!("op-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        OperationId(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        OperationId(s)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Payload of an audit record, tagged by `status` in its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordBody {
    /// Free-text log line with optional structured metadata.
    Log {
        message: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        metadata: Value,
    },
    /// A response (or an operation) was judged untrustworthy.
    UncertaintyHalt {
        reason: String,
        #[serde(default)]
        raw_response: Option<String>,
        context: Value,
        source: String,
    },
    /// A response passed every confidence check.
    Success { context: Value, source: String },
}

/// One immutable entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl AuditRecord {
    /// Plain log line stamped with the current time.
    pub fn log(
        level: Severity,
        message: impl Into<String>,
        operation_id: Option<OperationId>,
        metadata: Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            operation_id,
            body: RecordBody::Log {
                message: message.into(),
                metadata,
            },
        }
    }

    /// Uncertainty-halt record. Always `ERROR` severity.
    pub fn uncertainty_halt(
        operation_id: OperationId,
        reason: impl Into<String>,
        raw_response: Option<String>,
        context: Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level: Severity::Error,
            operation_id: Some(operation_id),
            body: RecordBody::UncertaintyHalt {
                reason: reason.into(),
                raw_response,
                context,
                source: source.into(),
            },
        }
    }

    /// Success record. Always `INFO` severity.
    pub fn success(operation_id: OperationId, context: Value, source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: Severity::Info,
            operation_id: Some(operation_id),
            body: RecordBody::Success {
                context,
                source: source.into(),
            },
        }
    }

    pub fn is_uncertainty_halt(&self) -> bool {
        matches!(self.body, RecordBody::UncertaintyHalt { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self.body, RecordBody::Success { .. })
    }

    /// Context attached to halt/success records.
    pub fn context(&self) -> Option<&Value> {
        match &self.body {
            RecordBody::UncertaintyHalt { context, .. } | RecordBody::Success { context, .. } => {
                Some(context)
            }
            RecordBody::Log { .. } => None,
        }
    }

    /// Message of a plain log line.
    pub fn message(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Log { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Serialize to the single-line JSON form used for storage and queries.
    pub fn to_line(&self) -> StorageResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Case-insensitive substring match used by every backend's `query`.
///
/// An absent or empty needle matches everything.
pub fn line_matches(line: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) if n.is_empty() => true,
        Some(n) => line.to_lowercase().contains(&n.to_lowercase()),
    }
}

// ---------------------------------------------------------------------------
// Log kinds
// ---------------------------------------------------------------------------

/// Log stream a record is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Main log; receives every record.
    Application,
    /// Error-level lines only.
    Errors,
    /// Uncertainty-halt records only.
    UncertaintyHalts,
}

impl LogKind {
    pub const ALL: [LogKind; 3] = [
        LogKind::Application,
        LogKind::Errors,
        LogKind::UncertaintyHalts,
    ];

    /// File name used by file-backed logs.
    pub fn file_name(self) -> &'static str {
        match self {
            LogKind::Application => "application.log",
            LogKind::Errors => "errors.log",
            LogKind::UncertaintyHalts => "uncertainty-halts.log",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Application => "application",
            LogKind::Errors => "errors",
            LogKind::UncertaintyHalts => "uncertainty_halts",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "application" | "application.log" | "app" => Ok(LogKind::Application),
            "errors" | "errors.log" | "error" => Ok(LogKind::Errors),
            "uncertainty_halts" | "uncertainty-halts" | "uncertainty-halts.log" | "halts" => {
                Ok(LogKind::UncertaintyHalts)
            }
            other => Err(format!("unknown log kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Durable, append-only audit log.
///
/// Guarantees:
/// - `append` is atomic per record: concurrent appends never interleave
///   partial records.
/// - `query` returns records of one kind in chronological (append) order.
/// - Every `query` re-reads the full log; there is no snapshot isolation
///   against appends running concurrently with the query.
/// - Records are never mutated or deleted through this interface.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one record to the given log stream.
    async fn append(&self, record: &AuditRecord, kind: LogKind) -> StorageResult<()>;

    /// All records of `kind` whose serialized form contains `needle`
    /// (case-insensitive), oldest first.
    async fn query(&self, needle: Option<&str>, kind: LogKind) -> StorageResult<Vec<AuditRecord>>;

    /// The most recent `limit` records of `kind`, oldest first.
    async fn tail(&self, kind: LogKind, limit: usize) -> StorageResult<Vec<AuditRecord>> {
        let mut records = self.query(None, kind).await?;
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_ids_are_unique_and_prefixed() {
        let a = OperationId::new();
        let b = OperationId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("op-"));
    }

    #[test]
    fn halt_record_serializes_with_status_tag() {
        let record = AuditRecord::uncertainty_halt(
            OperationId::from("op-1"),
            "Uncertainty keyword detected in response: \"unclear\"",
            Some("it is unclear".to_string()),
            json!({"error_code": "ERR_KEYWORD_UNCERTAINTY"}),
            "cli",
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "UNCERTAINTY_HALT");
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["operation_id"], "op-1");
        assert_eq!(value["context"]["error_code"], "ERR_KEYWORD_UNCERTAINTY");

        let back: AuditRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn log_line_omits_null_metadata() {
        let record = AuditRecord::log(Severity::Info, "started", None, Value::Null);
        let line = record.to_line().unwrap();
        assert!(!line.contains("metadata"));
        assert!(!line.contains("operation_id"));
        assert!(line.contains("\"status\":\"LOG\""));
    }

    #[test]
    fn line_matches_is_case_insensitive() {
        assert!(line_matches("{\"reason\":\"Unclear\"}", Some("UNCLEAR")));
        assert!(line_matches("anything", None));
        assert!(line_matches("anything", Some("")));
        assert!(!line_matches("anything", Some("nothing")));
    }

    #[test]
    fn log_kind_parses_aliases() {
        assert_eq!("halts".parse::<LogKind>().unwrap(), LogKind::UncertaintyHalts);
        assert_eq!("errors.log".parse::<LogKind>().unwrap(), LogKind::Errors);
        assert!("bogus".parse::<LogKind>().is_err());
        assert_eq!(LogKind::UncertaintyHalts.file_name(), "uncertainty-halts.log");
    }
}
