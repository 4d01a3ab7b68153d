//! Classification outcomes and the halt code taxonomy.

use std::fmt;
use std::str::FromStr;

use audit_ledger::OperationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable error code carried by every uncertainty halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HaltCode {
    /// Generator returned absent, empty or whitespace-only output.
    #[serde(rename = "ERR_EMPTY_RESPONSE")]
    EmptyResponse,
    /// Response contains a registered hedge phrase.
    #[serde(rename = "ERR_KEYWORD_UNCERTAINTY")]
    KeywordUncertainty,
    /// Structured output requested but the response does not parse.
    #[serde(rename = "ERR_JSON_PARSE")]
    JsonParse,
    /// Parsed response violates the expected schema.
    #[serde(rename = "ERR_SCHEMA_VALIDATION")]
    SchemaValidation,
    /// Every attempt was used without a success.
    #[serde(rename = "ERR_MAX_RETRIES_EXCEEDED")]
    MaxRetriesExceeded,
    /// The operation was cancelled at a suspension point.
    #[serde(rename = "ERR_OPERATION_CANCELLED")]
    Cancelled,
}

impl HaltCode {
    pub const ALL: [HaltCode; 6] = [
        HaltCode::EmptyResponse,
        HaltCode::KeywordUncertainty,
        HaltCode::JsonParse,
        HaltCode::SchemaValidation,
        HaltCode::MaxRetriesExceeded,
        HaltCode::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HaltCode::EmptyResponse => "ERR_EMPTY_RESPONSE",
            HaltCode::KeywordUncertainty => "ERR_KEYWORD_UNCERTAINTY",
            HaltCode::JsonParse => "ERR_JSON_PARSE",
            HaltCode::SchemaValidation => "ERR_SCHEMA_VALIDATION",
            HaltCode::MaxRetriesExceeded => "ERR_MAX_RETRIES_EXCEEDED",
            HaltCode::Cancelled => "ERR_OPERATION_CANCELLED",
        }
    }

    /// Human-readable description used as the base of halt reasons.
    pub fn description(self) -> &'static str {
        match self {
            HaltCode::EmptyResponse => "Response is empty or null",
            HaltCode::KeywordUncertainty => "Uncertainty keyword detected in response",
            HaltCode::JsonParse => "Response is not valid JSON",
            HaltCode::SchemaValidation => "Response failed schema validation",
            HaltCode::MaxRetriesExceeded => "Maximum retry attempts exceeded",
            HaltCode::Cancelled => "Operation cancelled before completion",
        }
    }
}

impl fmt::Display for HaltCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HaltCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HaltCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown halt code: {s}"))
    }
}

/// Payload of a successful classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Raw text, when no structured output was requested.
    Text(String),
    /// Parsed structured value.
    Structured(Value),
}

impl ResponseData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            ResponseData::Structured(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ResponseData::Structured(value) => Some(value),
            ResponseData::Text(_) => None,
        }
    }
}

/// Details of an uncertainty halt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyHalt {
    pub operation_id: OperationId,
    pub error_code: HaltCode,
    pub reason: String,
    /// Response text kept for forensic inspection.
    #[serde(default)]
    pub raw_response: Option<String>,
    /// Hedge phrase that triggered a keyword halt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

/// Coarse status of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    UncertaintyHalt,
}

/// Verdict on one response, or the terminal result of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationOutcome {
    Success {
        operation_id: OperationId,
        data: ResponseData,
    },
    UncertaintyHalt(UncertaintyHalt),
}

impl ClassificationOutcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            ClassificationOutcome::Success { .. } => OutcomeStatus::Success,
            ClassificationOutcome::UncertaintyHalt(_) => OutcomeStatus::UncertaintyHalt,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ClassificationOutcome::Success { .. })
    }

    pub fn operation_id(&self) -> &OperationId {
        match self {
            ClassificationOutcome::Success { operation_id, .. } => operation_id,
            ClassificationOutcome::UncertaintyHalt(halt) => &halt.operation_id,
        }
    }

    pub fn error_code(&self) -> Option<HaltCode> {
        self.halt().map(|h| h.error_code)
    }

    pub fn data(&self) -> Option<&ResponseData> {
        match self {
            ClassificationOutcome::Success { data, .. } => Some(data),
            ClassificationOutcome::UncertaintyHalt(_) => None,
        }
    }

    pub fn halt(&self) -> Option<&UncertaintyHalt> {
        match self {
            ClassificationOutcome::UncertaintyHalt(halt) => Some(halt),
            ClassificationOutcome::Success { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        self.halt().map(|h| h.reason.as_str())
    }
}
