//! Contract for the external text generator.

use std::sync::Arc;

use async_trait::async_trait;
use audit_ledger::OperationId;
use serde_json::{Map, Value};
use thiserror::Error;

/// Per-attempt request metadata handed to the generator alongside the prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub operation_id: OperationId,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Caller context plus `attempt` and `operation_id`.
    pub context: Map<String, Value>,
}

/// Generator-level fault. Never a content-quality verdict.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator failed: {message}")]
    Failed {
        message: String,
        /// Diagnostic detail such as a stack trace or stderr capture.
        trace: Option<String>,
    },

    #[error("generator timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GeneratorError {
    pub fn failed(message: impl Into<String>) -> Self {
        GeneratorError::Failed {
            message: message.into(),
            trace: None,
        }
    }

    /// Text recorded as the `trace` of a failure audit line.
    pub fn trace(&self) -> String {
        match self {
            GeneratorError::Failed {
                trace: Some(trace), ..
            } => trace.clone(),
            GeneratorError::Other(err) => format!("{err:?}"),
            other => other.to_string(),
        }
    }
}

/// External text-generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<String, GeneratorError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn invoke(
        &self,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<String, GeneratorError> {
        (**self).invoke(prompt, request).await
    }
}
