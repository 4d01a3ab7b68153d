//! Retry orchestration driven by a scripted generator.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use audit_ledger::fakes::MemoryAuditLog;
use certitude_core::{
    AuditLog, AuditTrail, CancellationToken, ConfidenceGate, GenerationRequest, Generator,
    GeneratorError, HaltCode, LogKind, OperationContext, RetryOrchestrator, RetryPolicy, Schema,
    Severity, ValueType,
};
use tokio::sync::Mutex;

#[derive(Clone)]
enum Step {
    Respond(&'static str),
    Fail(&'static str),
    Sleep(u64),
}

#[derive(Clone)]
struct ScriptedGenerator {
    steps: Arc<Mutex<Vec<Step>>>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerator {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps)),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn invoke(
        &self,
        _prompt: &str,
        request: &GenerationRequest,
    ) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().await.push(request.clone());
        let step = {
            let mut guard = self.steps.lock().await;
            if guard.is_empty() {
                Step::Fail("no scripted step")
            } else {
                guard.remove(0)
            }
        };

        match step {
            Step::Respond(text) => Ok(text.to_string()),
            Step::Fail(msg) => Err(GeneratorError::failed(msg)),
            Step::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok("slept".to_string())
            }
        }
    }
}

fn policy(max_retries: u32, delay_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::from_millis(delay_ms),
        generator_timeout: Some(Duration::from_secs(120)),
    }
}

fn orchestrator(
    steps: Vec<Step>,
    policy: RetryPolicy,
) -> (
    Arc<MemoryAuditLog>,
    ScriptedGenerator,
    RetryOrchestrator<ScriptedGenerator>,
) {
    let log = Arc::new(MemoryAuditLog::new());
    let gate = Arc::new(ConfidenceGate::new(
        AuditTrail::new(log.clone()).with_console_echo(false),
    ));
    let generator = ScriptedGenerator::new(steps);
    let orchestrator = RetryOrchestrator::new(generator.clone(), gate, policy);
    (log, generator, orchestrator)
}

// ===========================================================================
// Success paths
// ===========================================================================

#[tokio::test]
async fn first_success_returns_immediately() {
    let (log, generator, orch) = orchestrator(vec![Step::Respond("done")], policy(3, 0));
    let outcome = orch.execute("do it", &OperationContext::new()).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(generator.call_count(), 1);

    let records = log.query(None, LogKind::Application).await.unwrap();
    assert_eq!(records[0].message(), Some("Starting generator operation"));
    assert!(records.iter().all(|r| r.operation_id.as_ref() == Some(outcome.operation_id())));
}

#[tokio::test]
async fn success_on_attempt_two_short_circuits() {
    let (log, generator, orch) = orchestrator(
        vec![Step::Fail("boom"), Step::Respond("done"), Step::Respond("never")],
        policy(3, 0),
    );
    let outcome = orch.execute("do it", &OperationContext::new()).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(generator.call_count(), 2);

    let op = outcome.operation_id().as_str();
    let records = log.query(Some(op), LogKind::Application).await.unwrap();
    assert_eq!(records.iter().filter(|r| r.is_success()).count(), 1);
    assert_eq!(log.query(None, LogKind::Errors).await.unwrap().len(), 1);
}

// ===========================================================================
// Exhaustion
// ===========================================================================

#[tokio::test]
async fn consecutive_faults_exhaust_with_one_record_each() {
    let (log, generator, orch) = orchestrator(
        vec![Step::Fail("e1"), Step::Fail("e2"), Step::Fail("e3"), Step::Fail("e4")],
        policy(4, 0),
    );
    let outcome = orch.execute("do it", &OperationContext::new()).await.unwrap();

    assert_eq!(outcome.error_code(), Some(HaltCode::MaxRetriesExceeded));
    assert_eq!(generator.call_count(), 4);

    let failures = log.query(None, LogKind::Errors).await.unwrap();
    assert_eq!(failures.len(), 4);
    assert!(failures.iter().all(|r| r.level == Severity::Error));

    let halts = log.query(None, LogKind::UncertaintyHalts).await.unwrap();
    assert_eq!(halts.len(), 1);
    let context = halts[0].context().unwrap();
    assert_eq!(context["error_code"], "ERR_MAX_RETRIES_EXCEEDED");
    assert_eq!(context["attempts"], 4);
    assert_eq!(context["last_error"], "generator failed: e4");
    assert!(outcome.reason().unwrap().contains("e4"));
}

#[tokio::test(start_paused = true)]
async fn linear_backoff_between_faults() {
    let (_log, generator, orch) = orchestrator(
        vec![Step::Fail("a"), Step::Fail("b"), Step::Fail("c")],
        policy(3, 1_000),
    );
    let started = tokio::time::Instant::now();
    let outcome = orch.execute("do it", &OperationContext::new()).await.unwrap();

    assert_eq!(outcome.error_code(), Some(HaltCode::MaxRetriesExceeded));
    assert_eq!(generator.call_count(), 3);
    assert!(started.elapsed() >= Duration::from_millis(3_000));
    assert!(started.elapsed() < Duration::from_millis(4_000));
}

// ===========================================================================
// Uncertainty retry policy
// ===========================================================================

#[tokio::test]
async fn halt_without_opt_in_is_returned_directly() {
    let (log, generator, orch) = orchestrator(
        vec![Step::Respond("I'm not sure"), Step::Respond("done")],
        policy(3, 0),
    );
    let outcome = orch.execute("do it", &OperationContext::new()).await.unwrap();

    assert_eq!(outcome.error_code(), Some(HaltCode::KeywordUncertainty));
    assert_eq!(generator.call_count(), 1);
    assert_eq!(log.query(None, LogKind::UncertaintyHalts).await.unwrap().len(), 1);
}

#[tokio::test]
async fn halt_with_opt_in_retries_until_success() {
    let (_log, generator, orch) = orchestrator(
        vec![Step::Respond("{oops"), Step::Respond(r#"{"a": 1, "b": "x"}"#)],
        policy(3, 0),
    );
    let ctx = OperationContext::new().retry_on_uncertainty();
    let schema = Schema::shorthand([("a", ValueType::Number), ("b", ValueType::String)]);
    let outcome = orch.execute_with_validation("emit json", schema, &ctx).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn halt_on_final_attempt_with_opt_in_is_returned() {
    let (log, generator, orch) = orchestrator(
        vec![Step::Respond("unclear"), Step::Respond("still unclear")],
        policy(2, 0),
    );
    let ctx = OperationContext::new().retry_on_uncertainty();
    let outcome = orch.execute("do it", &ctx).await.unwrap();

    assert_eq!(outcome.error_code(), Some(HaltCode::KeywordUncertainty));
    assert_eq!(
        outcome.halt().unwrap().raw_response.as_deref(),
        Some("still unclear")
    );
    assert_eq!(generator.call_count(), 2);

    let halts = log.query(None, LogKind::UncertaintyHalts).await.unwrap();
    assert_eq!(halts.len(), 2);
    assert!(log.query(Some("ERR_MAX_RETRIES_EXCEEDED"), LogKind::UncertaintyHalts)
        .await
        .unwrap()
        .is_empty());
}

// ===========================================================================
// Timeout and cancellation
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn slow_generator_times_out_and_is_retried() {
    let (log, generator, orch) = orchestrator(
        vec![Step::Sleep(10_000), Step::Respond("done")],
        RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
            generator_timeout: Some(Duration::from_millis(500)),
        },
    );
    let outcome = orch.execute("do it", &OperationContext::new()).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(generator.call_count(), 2);
    let failures = log.query(Some("timed out"), LogKind::Errors).await.unwrap();
    assert_eq!(failures.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_halts_operation() {
    let (log, generator, orch) = orchestrator(
        vec![Step::Fail("a"), Step::Respond("done")],
        policy(3, 60_000),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = orch
        .execute_with_cancel("do it", &OperationContext::new(), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.error_code(), Some(HaltCode::Cancelled));
    assert_eq!(generator.call_count(), 1);
    let halts = log.query(Some("ERR_OPERATION_CANCELLED"), LogKind::UncertaintyHalts).await.unwrap();
    assert_eq!(halts.len(), 1);
}

#[tokio::test]
async fn cancelled_before_start_never_calls_generator() {
    let (_log, generator, orch) = orchestrator(vec![Step::Respond("done")], policy(3, 0));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = orch
        .execute_with_cancel("do it", &OperationContext::new(), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.error_code(), Some(HaltCode::Cancelled));
    assert_eq!(generator.call_count(), 0);
}

// ===========================================================================
// Audit trail shape
// ===========================================================================

#[tokio::test]
async fn records_follow_attempt_order() {
    let (log, _generator, orch) = orchestrator(
        vec![Step::Fail("first"), Step::Respond("done")],
        policy(3, 0),
    );
    let outcome = orch
        .execute("x".repeat(300).as_str(), &OperationContext::new().with_command("write_report"))
        .await
        .unwrap();

    let records = log.query(Some(outcome.operation_id().as_str()), LogKind::Application).await.unwrap();
    let kinds: Vec<String> = records
        .iter()
        .map(|r| match r.message() {
            Some(m) => m.split_whitespace().take(2).collect::<Vec<_>>().join(" "),
            None if r.is_success() => "SUCCESS".to_string(),
            None => "HALT".to_string(),
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["Starting generator", "Generator call", "SUCCESS", "Operation completed"]
    );

    let start = records[0].clone();
    let meta = match start.body {
        audit_ledger::RecordBody::Log { metadata, .. } => metadata,
        _ => unreachable!(),
    };
    assert_eq!(meta["command_attempted"], "write_report");
    assert_eq!(meta["prompt"].as_str().unwrap().chars().count(), 203);
    assert_eq!(meta["prompt_sha256"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn generator_sees_stable_operation_id_and_attempt() {
    let (_log, generator, orch) = orchestrator(
        vec![Step::Fail("a"), Step::Fail("b"), Step::Respond("done")],
        policy(3, 0),
    );
    let outcome = orch
        .execute("do it", &OperationContext::new().with_attribute("ticket", "T-1"))
        .await
        .unwrap();

    let seen = generator.seen.lock().await;
    assert_eq!(seen.len(), 3);
    for (i, request) in seen.iter().enumerate() {
        assert_eq!(request.attempt, i as u32 + 1);
        assert_eq!(&request.operation_id, outcome.operation_id());
        assert_eq!(request.context["ticket"], "T-1");
        assert_eq!(request.context["attempt"], i as u64 + 1);
    }
}
