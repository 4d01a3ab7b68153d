//! Confidence gate: classifies one raw response as SUCCESS or UNCERTAINTY_HALT.
//!
//! Stages, in order:
//! 1. empty check and uncertainty-phrase scan (always)
//! 2. structured-format parse (when structured output is wanted)
//! 3. shape validation (when a schema is supplied)
//!
//! Every classification writes exactly one audit record before returning.

use std::sync::Arc;

use audit_ledger::{OperationId, StorageResult};
use serde_json::{json, Map, Value};

use crate::audit::AuditTrail;
use crate::domain::{ClassificationOutcome, HaltCode, OperationContext, ResponseData, UncertaintyHalt};
use crate::keywords::KeywordSet;
use crate::metrics::METRICS;
use crate::obs;
use crate::stats::GateStats;
use crate::validator::{Schema, SchemaValidator};

/// Source attributed to records when the caller does not name one.
pub const DEFAULT_SOURCE: &str = "certitude";

/// Pure result of the classification pipeline, before any audit write.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass(ResponseData),
    Halt {
        code: HaltCode,
        reason: String,
        keyword: Option<String>,
        /// Stage-specific audit context (`keyword`, `parse_error`, ...).
        details: Map<String, Value>,
    },
}

impl Verdict {
    fn halt(code: HaltCode, reason: String) -> Self {
        Verdict::Halt {
            code,
            reason,
            keyword: None,
            details: Map::new(),
        }
    }

    pub fn error_code(&self) -> Option<HaltCode> {
        match self {
            Verdict::Pass(_) => None,
            Verdict::Halt { code, .. } => Some(*code),
        }
    }
}

/// Classifier plus its audit side effect. Safe to share across tasks.
pub struct ConfidenceGate {
    keywords: Arc<KeywordSet>,
    validator: SchemaValidator,
    audit: AuditTrail,
    default_source: String,
}

impl ConfidenceGate {
    /// Gate with the default keyword set.
    pub fn new(audit: AuditTrail) -> Self {
        Self {
            keywords: Arc::new(KeywordSet::default()),
            validator: SchemaValidator::new(),
            audit,
            default_source: DEFAULT_SOURCE.to_string(),
        }
    }

    pub fn with_keywords(mut self, keywords: Arc<KeywordSet>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = source.into();
        self
    }

    pub fn keywords(&self) -> &Arc<KeywordSet> {
        &self.keywords
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn add_uncertainty_keyword(&self, phrase: &str) -> bool {
        self.keywords.add(phrase)
    }

    pub fn remove_uncertainty_keyword(&self, phrase: &str) -> bool {
        self.keywords.remove(phrase)
    }

    /// Run the pipeline without touching the audit log.
    pub fn classify(&self, raw: Option<&str>, structured: bool, schema: Option<&Schema>) -> Verdict {
        let text = match raw {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                return Verdict::halt(
                    HaltCode::EmptyResponse,
                    HaltCode::EmptyResponse.description().to_string(),
                )
            }
        };

        if let Some(keyword) = self.keywords.first_match(text) {
            let mut details = Map::new();
            details.insert("keyword".into(), Value::String(keyword.clone()));
            return Verdict::Halt {
                code: HaltCode::KeywordUncertainty,
                reason: format!("{}: \"{keyword}\"", HaltCode::KeywordUncertainty.description()),
                keyword: Some(keyword),
                details,
            };
        }

        if !structured && schema.is_none() {
            return Verdict::Pass(ResponseData::Text(text.to_string()));
        }

        let parsed: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                let mut details = Map::new();
                details.insert("parse_error".into(), Value::String(e.to_string()));
                return Verdict::Halt {
                    code: HaltCode::JsonParse,
                    reason: format!("{}: {e}", HaltCode::JsonParse.description()),
                    keyword: None,
                    details,
                };
            }
        };

        if let Some(schema) = schema {
            let violations = self.validator.validate(&parsed, schema);
            if !violations.is_empty() {
                let summary: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();
                let mut details = Map::new();
                details.insert("expected_schema".into(), schema.to_json());
                details.insert("parsed_response".into(), parsed);
                details.insert(
                    "violations".into(),
                    serde_json::to_value(&violations).unwrap_or(Value::Null),
                );
                return Verdict::Halt {
                    code: HaltCode::SchemaValidation,
                    reason: format!(
                        "{}: {}",
                        HaltCode::SchemaValidation.description(),
                        summary.join("; ")
                    ),
                    keyword: None,
                    details,
                };
            }
        }

        Verdict::Pass(ResponseData::Structured(parsed))
    }

    /// Classify one response and record the verdict.
    ///
    /// `schema` overrides the context's expected schema. A fresh operation id
    /// is generated when none is supplied. The only error is a failure to
    /// write the audit record.
    pub async fn evaluate(
        &self,
        raw: Option<&str>,
        ctx: &OperationContext,
        schema: Option<&Schema>,
        operation_id: Option<OperationId>,
    ) -> StorageResult<ClassificationOutcome> {
        let operation_id = operation_id.unwrap_or_default();
        let schema = schema.or(ctx.expected_schema.as_ref());
        let verdict = self.classify(raw, ctx.wants_structured(), schema);
        let source = ctx.source_or(&self.default_source);
        let mut context = ctx.to_audit_value();

        obs::emit_classified(operation_id.as_str(), verdict.error_code());
        METRICS.inc_classification(verdict.error_code().is_none());

        match verdict {
            Verdict::Pass(data) => {
                self.audit
                    .success(&operation_id, Value::Object(context), source)
                    .await?;
                Ok(ClassificationOutcome::Success { operation_id, data })
            }
            Verdict::Halt {
                code,
                reason,
                keyword,
                details,
            } => {
                context.insert("error_code".into(), json!(code));
                context.extend(details);
                let raw_response = raw.map(str::to_string);
                self.audit
                    .uncertainty_halt(
                        &operation_id,
                        reason.clone(),
                        raw_response.clone(),
                        Value::Object(context),
                        source,
                    )
                    .await?;
                Ok(ClassificationOutcome::UncertaintyHalt(UncertaintyHalt {
                    operation_id,
                    error_code: code,
                    reason,
                    raw_response,
                    keyword,
                }))
            }
        }
    }

    /// Halt totals by error code, read back from the audit log.
    pub async fn stats(&self) -> StorageResult<GateStats> {
        let halts = self
            .audit
            .search(None, audit_ledger::LogKind::UncertaintyHalts)
            .await?;
        Ok(GateStats::from_halt_records(&halts, self.keywords.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValueType;
    use audit_ledger::fakes::MemoryAuditLog;

    fn gate() -> ConfidenceGate {
        ConfidenceGate::new(AuditTrail::new(Arc::new(MemoryAuditLog::new())).with_console_echo(false))
    }

    #[test]
    fn whitespace_is_empty() {
        let gate = gate();
        assert_eq!(
            gate.classify(Some("  \n\t"), false, None).error_code(),
            Some(HaltCode::EmptyResponse)
        );
        assert_eq!(gate.classify(None, false, None).error_code(), Some(HaltCode::EmptyResponse));
    }

    #[test]
    fn keyword_scan_runs_before_parse() {
        let gate = gate();
        let schema = Schema::shorthand([("note", ValueType::String)]);
        let verdict = gate.classify(Some(r#"{"note": "this is unclear"}"#), true, Some(&schema));
        match verdict {
            Verdict::Halt { code, keyword, .. } => {
                assert_eq!(code, HaltCode::KeywordUncertainty);
                assert_eq!(keyword.as_deref(), Some("unclear"));
            }
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_passes_through() {
        let gate = gate();
        assert_eq!(
            gate.classify(Some("done"), false, None),
            Verdict::Pass(ResponseData::Text("done".to_string()))
        );
    }

    #[test]
    fn schema_halt_carries_details() {
        let gate = gate();
        let schema = Schema::shorthand([("a", ValueType::Number), ("b", ValueType::String)]);
        match gate.classify(Some(r#"{"a":1}"#), false, Some(&schema)) {
            Verdict::Halt { code, details, reason, .. } => {
                assert_eq!(code, HaltCode::SchemaValidation);
                assert!(reason.contains("'b'"));
                assert!(details.contains_key("expected_schema"));
                assert_eq!(details["parsed_response"], serde_json::json!({"a": 1}));
                assert_eq!(details["violations"][0]["error_code"], "ERR_MISSING_FIELD");
            }
            other => panic!("expected halt, got {other:?}"),
        }
    }
}
