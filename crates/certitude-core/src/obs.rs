//! Structured observability hooks for operation lifecycle events.
//!
//! - Operation-scoped tracing spans via [`operation_span`]
//! - Emission functions for start, attempt failure, classification, retry,
//!   cancellation and finish
//!
//! Events are emitted at `info!` level unless noted. Filter with `RUST_LOG`.

use tracing::{info, warn, Span};

use crate::domain::HaltCode;

/// Span tagging every event of one operation with its `operation_id`.
///
/// Attach it to the operation future with `tracing::Instrument`, so the
/// future stays `Send`:
///
/// ```ignore
/// run_attempts().instrument(operation_span("op-1234")).await
/// ```
pub fn operation_span(operation_id: &str) -> Span {
    tracing::info_span!("certitude.operation", operation_id = %operation_id)
}

pub fn emit_operation_started(operation_id: &str, source: &str, max_retries: u32) {
    info!(
        event = "operation.started",
        operation_id = %operation_id,
        source = %source,
        max_retries = max_retries,
    );
}

/// Emit event: a generator invocation failed (warning level).
pub fn emit_attempt_failed(operation_id: &str, attempt: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "attempt.failed",
        operation_id = %operation_id,
        attempt = attempt,
        error = %error,
    );
}

/// Emit event: the gate classified a response.
pub fn emit_classified(operation_id: &str, code: Option<HaltCode>) {
    match code {
        None => info!(event = "gate.classified", operation_id = %operation_id, status = "SUCCESS"),
        Some(code) => info!(
            event = "gate.classified",
            operation_id = %operation_id,
            status = "UNCERTAINTY_HALT",
            error_code = %code,
        ),
    }
}

pub fn emit_retry_scheduled(operation_id: &str, attempt: u32, delay_ms: u64) {
    info!(
        event = "attempt.retry_scheduled",
        operation_id = %operation_id,
        next_attempt = attempt + 1,
        delay_ms = delay_ms,
    );
}

/// Emit event: the operation was cancelled (warning level).
pub fn emit_operation_cancelled(operation_id: &str, attempt: u32) {
    warn!(event = "operation.cancelled", operation_id = %operation_id, attempt = attempt);
}

pub fn emit_operation_finished(
    operation_id: &str,
    attempts: u32,
    duration_ms: u64,
    code: Option<HaltCode>,
) {
    info!(
        event = "operation.finished",
        operation_id = %operation_id,
        attempts = attempts,
        duration_ms = duration_ms,
        success = code.is_none(),
        error_code = code.map(HaltCode::as_str).unwrap_or(""),
    );
}
