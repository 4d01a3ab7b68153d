//! Tracing hooks for operation lifecycle events and audit mirroring.

use std::sync::Arc;

use audit_ledger::fakes::MemoryAuditLog;
use certitude_core::metrics::Metrics;
use certitude_core::obs::{
    emit_attempt_failed, emit_classified, emit_operation_cancelled, emit_operation_finished,
    emit_operation_started, emit_retry_scheduled, operation_span,
};
use certitude_core::{AuditTrail, ConfidenceGate, HaltCode, OperationContext};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn started_event_carries_operation_and_source() {
    emit_operation_started("op-obs-1", "cli", 3);
    assert!(logs_contain("operation.started"));
    assert!(logs_contain("op-obs-1"));
}

#[traced_test]
#[test]
fn attempt_failure_is_a_warning() {
    emit_attempt_failed("op-obs-2", 2, &"connection reset");
    assert!(logs_contain("attempt.failed"));
    assert!(logs_contain("connection reset"));
}

#[traced_test]
#[test]
fn classification_event_names_error_code() {
    emit_classified("op-obs-3", Some(HaltCode::SchemaValidation));
    emit_classified("op-obs-4", None);
    assert!(logs_contain("ERR_SCHEMA_VALIDATION"));
    assert!(logs_contain("SUCCESS"));
}

#[traced_test]
#[test]
fn retry_cancel_and_finish_events() {
    emit_retry_scheduled("op-obs-5", 1, 1000);
    emit_operation_cancelled("op-obs-5", 2);
    emit_operation_finished("op-obs-5", 2, 1500, Some(HaltCode::Cancelled));
    assert!(logs_contain("attempt.retry_scheduled"));
    assert!(logs_contain("operation.cancelled"));
    assert!(logs_contain("ERR_OPERATION_CANCELLED"));
}

#[traced_test]
#[test]
fn operation_span_tags_nested_events() {
    let span = operation_span("op-obs-6");
    let _guard = span.enter();
    emit_classified("op-obs-6", None);
    assert!(logs_contain("certitude.operation"));
}

#[traced_test]
#[tokio::test]
async fn audit_records_are_mirrored_when_echo_enabled() {
    let trail = AuditTrail::new(Arc::new(MemoryAuditLog::new()));
    trail
        .warn("mirrored warning line", None, json!({}))
        .await
        .unwrap();
    assert!(logs_contain("mirrored warning line"));

    let quiet = AuditTrail::new(Arc::new(MemoryAuditLog::new())).with_console_echo(false);
    quiet.info("silent info line", None, json!({})).await.unwrap();
    assert!(!logs_contain("silent info line"));
}

#[traced_test]
#[tokio::test]
async fn gate_halt_is_mirrored_as_error() {
    let gate = ConfidenceGate::new(AuditTrail::new(Arc::new(MemoryAuditLog::new())));
    gate.evaluate(Some("cannot determine"), &OperationContext::new(), None, None)
        .await
        .unwrap();
    assert!(logs_contain("UNCERTAINTY HALT"));
}

#[traced_test]
#[test]
fn metrics_flush_emits_counters() {
    let metrics = Metrics::new();
    metrics.inc_classification(false);
    metrics.inc_generator_failures();
    metrics.flush();
    assert!(logs_contain("generator_failures=1"));
}
