//! Retry orchestrator: bounded, strictly serial attempts of
//! "invoke generator → classify" for one logical operation.
//!
//! Generator faults are retried up to the bound. Uncertainty halts (keyword,
//! parse and schema alike) are retried only when the caller opts in with
//! `retry_on_uncertainty`; a halt on the final attempt is returned as-is.
//! Backoff is linear: `retry_delay * attempt`.
//!
//! Audit order per operation: start → per-attempt failure/halt → terminal
//! record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use audit_ledger::{OperationId, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::confidence_gate::ConfidenceGate;
use crate::domain::{ClassificationOutcome, HaltCode, OperationContext, UncertaintyHalt};
use crate::generator::{GenerationRequest, Generator, GeneratorError};
use crate::metrics::METRICS;
use crate::obs;
use crate::validator::Schema;

/// Characters of the prompt kept in the start record.
pub const PROMPT_PREVIEW_CHARS: usize = 200;

/// Recorded as `command_attempted` when the context names no command.
pub const DEFAULT_COMMAND: &str = "Generator operation";

/// Attempt bound, backoff base and per-call timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// `None` leaves generator calls unbounded.
    pub generator_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
            generator_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after a failed `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.checked_mul(attempt).unwrap_or(Duration::MAX)
    }

    /// Worst-case total backoff: `retry_delay * (n-1)n/2`, saturating.
    pub fn max_total_backoff(&self) -> Duration {
        (1..self.max_retries).fold(Duration::ZERO, |total, a| {
            total.saturating_add(self.backoff(a))
        })
    }
}

/// Drives attempts against one generator and one gate.
pub struct RetryOrchestrator<G: Generator> {
    generator: G,
    gate: Arc<ConfidenceGate>,
    policy: RetryPolicy,
}

enum AttemptEnd {
    Finished(ClassificationOutcome),
    Retry,
}

impl<G: Generator> RetryOrchestrator<G> {
    pub fn new(generator: G, gate: Arc<ConfidenceGate>, policy: RetryPolicy) -> Self {
        Self {
            generator,
            gate,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &Arc<ConfidenceGate> {
        &self.gate
    }

    /// Run one operation to a terminal outcome.
    pub async fn execute(
        &self,
        prompt: &str,
        ctx: &OperationContext,
    ) -> StorageResult<ClassificationOutcome> {
        self.execute_with_cancel(prompt, ctx, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), forcing structured output checked
    /// against `schema`.
    pub async fn execute_with_validation(
        &self,
        prompt: &str,
        schema: Schema,
        ctx: &OperationContext,
    ) -> StorageResult<ClassificationOutcome> {
        let ctx = ctx.clone().expect_json().with_schema(schema);
        self.execute(prompt, &ctx).await
    }

    /// Run one operation, honouring `cancel` at the generator call and at
    /// every backoff sleep.
    pub async fn execute_with_cancel(
        &self,
        prompt: &str,
        ctx: &OperationContext,
        cancel: &CancellationToken,
    ) -> StorageResult<ClassificationOutcome> {
        let operation_id = OperationId::new();
        let span = obs::operation_span(operation_id.as_str());
        self.run(prompt, ctx, cancel, operation_id)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        prompt: &str,
        ctx: &OperationContext,
        cancel: &CancellationToken,
        operation_id: OperationId,
    ) -> StorageResult<ClassificationOutcome> {
        let started = Instant::now();
        let audit = self.gate.audit();
        let source = ctx.source_or(self.gate.default_source()).to_string();
        let max = self.policy.max_retries.max(1);

        obs::emit_operation_started(operation_id.as_str(), &source, max);
        audit
            .info(
                "Starting generator operation",
                Some(&operation_id),
                json!({
                    "prompt": preview(prompt),
                    "prompt_sha256": fingerprint(prompt),
                    "command_attempted": ctx.command.as_deref().unwrap_or(DEFAULT_COMMAND),
                    "source": source,
                    "max_retries": max,
                }),
            )
            .await?;

        let mut last_error: Option<String> = None;

        for attempt in 1..=max {
            if cancel.is_cancelled() {
                return self
                    .cancelled(&operation_id, attempt, ctx, &source, started)
                    .await;
            }

            let request = GenerationRequest {
                operation_id: operation_id.clone(),
                attempt,
                context: {
                    let mut map = ctx.to_audit_value();
                    map.insert("attempt".into(), json!(attempt));
                    map.insert("operation_id".into(), json!(operation_id));
                    map
                },
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.cancelled(&operation_id, attempt, ctx, &source, started).await;
                }
                result = self.invoke_bounded(prompt, &request) => result,
            };

            let end = match result {
                Err(err) => {
                    self.record_failure(&operation_id, attempt, max, &err, &source)
                        .await?;
                    last_error = Some(err.to_string());
                    AttemptEnd::Retry
                }
                Ok(response) => {
                    let attempt_ctx = ctx.clone().with_attribute("attempt", attempt);
                    let outcome = self
                        .gate
                        .evaluate(Some(&response), &attempt_ctx, None, Some(operation_id.clone()))
                        .await?;
                    match &outcome {
                        ClassificationOutcome::Success { .. } => {
                            audit
                                .info(
                                    format!("Operation completed successfully on attempt {attempt}"),
                                    Some(&operation_id),
                                    json!({"attempt": attempt}),
                                )
                                .await?;
                            AttemptEnd::Finished(outcome)
                        }
                        ClassificationOutcome::UncertaintyHalt(halt) => {
                            audit
                                .warn(
                                    format!("Uncertainty halt on attempt {attempt}: {}", halt.reason),
                                    Some(&operation_id),
                                    json!({"attempt": attempt, "error_code": halt.error_code}),
                                )
                                .await?;
                            if ctx.retry_on_uncertainty && attempt < max {
                                AttemptEnd::Retry
                            } else {
                                AttemptEnd::Finished(outcome)
                            }
                        }
                    }
                }
            };

            if let AttemptEnd::Finished(outcome) = end {
                obs::emit_operation_finished(
                    operation_id.as_str(),
                    attempt,
                    elapsed_ms(started),
                    outcome.error_code(),
                );
                return Ok(outcome);
            }

            if attempt < max {
                let delay = self.policy.backoff(attempt);
                METRICS.inc_retries();
                obs::emit_retry_scheduled(operation_id.as_str(), attempt, delay.as_millis() as u64);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return self.cancelled(&operation_id, attempt + 1, ctx, &source, started).await;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.exhausted(&operation_id, max, ctx, &source, last_error, started)
            .await
    }

    async fn invoke_bounded(
        &self,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<String, GeneratorError> {
        match self.policy.generator_timeout {
            Some(limit) if !limit.is_zero() => {
                match tokio::time::timeout(limit, self.generator.invoke(prompt, request)).await {
                    Ok(result) => result,
                    Err(_) => Err(GeneratorError::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                    }),
                }
            }
            _ => self.generator.invoke(prompt, request).await,
        }
    }

    async fn record_failure(
        &self,
        operation_id: &OperationId,
        attempt: u32,
        max: u32,
        err: &GeneratorError,
        source: &str,
    ) -> StorageResult<()> {
        METRICS.inc_generator_failures();
        obs::emit_attempt_failed(operation_id.as_str(), attempt, err);
        self.gate
            .audit()
            .error(
                format!("Generator call failed on attempt {attempt}/{max}: {err}"),
                Some(operation_id),
                json!({
                    "attempt": attempt,
                    "error": err.to_string(),
                    "trace": err.trace(),
                    "source": source,
                }),
            )
            .await
    }

    async fn cancelled(
        &self,
        operation_id: &OperationId,
        attempt: u32,
        ctx: &OperationContext,
        source: &str,
        started: Instant,
    ) -> StorageResult<ClassificationOutcome> {
        METRICS.inc_cancellations();
        obs::emit_operation_cancelled(operation_id.as_str(), attempt);

        let code = HaltCode::Cancelled;
        let reason = format!("{} (attempt {attempt})", code.description());
        let mut context = ctx.to_audit_value();
        context.insert("error_code".into(), json!(code));
        context.insert("attempt".into(), json!(attempt));
        self.gate
            .audit()
            .uncertainty_halt(operation_id, reason.clone(), None, Value::Object(context), source)
            .await?;

        obs::emit_operation_finished(operation_id.as_str(), attempt, elapsed_ms(started), Some(code));
        Ok(halt_outcome(operation_id, code, reason))
    }

    async fn exhausted(
        &self,
        operation_id: &OperationId,
        attempts: u32,
        ctx: &OperationContext,
        source: &str,
        last_error: Option<String>,
        started: Instant,
    ) -> StorageResult<ClassificationOutcome> {
        let code = HaltCode::MaxRetriesExceeded;
        let reason = match &last_error {
            Some(err) => format!("{} after {attempts} attempts: {err}", code.description()),
            None => format!("{} after {attempts} attempts", code.description()),
        };

        let mut context = ctx.to_audit_value();
        context.insert("error_code".into(), json!(code));
        context.insert("attempts".into(), json!(attempts));
        context.insert("last_error".into(), json!(last_error));
        self.gate
            .audit()
            .uncertainty_halt(operation_id, reason.clone(), None, Value::Object(context), source)
            .await?;

        obs::emit_operation_finished(operation_id.as_str(), attempts, elapsed_ms(started), Some(code));
        Ok(halt_outcome(operation_id, code, reason))
    }
}

fn halt_outcome(operation_id: &OperationId, code: HaltCode, reason: String) -> ClassificationOutcome {
    ClassificationOutcome::UncertaintyHalt(UncertaintyHalt {
        operation_id: operation_id.clone(),
        error_code: code,
        reason,
        raw_response: None,
        keyword: None,
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// First [`PROMPT_PREVIEW_CHARS`] characters, with `...` when cut.
pub fn preview(prompt: &str) -> String {
    match prompt.char_indices().nth(PROMPT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &prompt[..cut]),
        None => prompt.to_string(),
    }
}

/// Hex SHA-256 of the full prompt.
pub fn fingerprint(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}
