//! Typed per-call context.
//!
//! The recognised keys are explicit fields; anything else a caller wants in
//! the audit trail goes into the open `attributes` bag.

use serde_json::{Map, Value};

use crate::validator::Schema;

/// Caller-supplied context for one evaluation or operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    /// Audit attribution; the configured default source is used when absent.
    pub source: Option<String>,
    /// Human-readable name of the command being attempted.
    pub command: Option<String>,
    /// Force the structured-format check.
    pub expect_json: bool,
    /// Shape the parsed response must satisfy. Implies `expect_json`.
    pub expected_schema: Option<Schema>,
    /// Retry when an attempt ends in an uncertainty halt.
    pub retry_on_uncertainty: bool,
    /// Free-form attribution metadata, copied into every audit record.
    pub attributes: Map<String, Value>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.expect_json = true;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.expected_schema = Some(schema);
        self
    }

    pub fn retry_on_uncertainty(mut self) -> Self {
        self.retry_on_uncertainty = true;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the response must parse as structured data.
    pub fn wants_structured(&self) -> bool {
        self.expect_json || self.expected_schema.is_some()
    }

    pub fn source_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.source.as_deref().unwrap_or(default)
    }

    /// Audit form: attributes plus the recognised flags. The schema is left
    /// out; halts that depend on it record it explicitly.
    pub fn to_audit_value(&self) -> Map<String, Value> {
        let mut map = self.attributes.clone();
        if let Some(source) = &self.source {
            map.insert("source".into(), Value::String(source.clone()));
        }
        if let Some(command) = &self.command {
            map.insert("command".into(), Value::String(command.clone()));
        }
        if self.wants_structured() {
            map.insert("expect_json".into(), Value::Bool(true));
        }
        if self.retry_on_uncertainty {
            map.insert("retry_on_uncertainty".into(), Value::Bool(true));
        }
        map
    }
}
