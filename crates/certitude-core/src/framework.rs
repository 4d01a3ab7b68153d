//! `SafetyFramework`: one object wiring the audit trail, confidence gate and
//! retry orchestrator together from a [`FrameworkConfig`].

use std::collections::BTreeMap;
use std::sync::Arc;

use audit_ledger::{AuditLog, AuditRecord, LogKind, OperationId, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::audit::AuditTrail;
use crate::config::FrameworkConfig;
use crate::confidence_gate::ConfidenceGate;
use crate::domain::{ClassificationOutcome, OperationContext, Result};
use crate::generator::Generator;
use crate::keywords::KeywordSet;
use crate::orchestrator::RetryOrchestrator;
use crate::prompts::FileSystemOperation;
use crate::stats::{ExecutionStats, RecentActivity};
use crate::validator::{Schema, ValidationReport};

/// Source attributed to filesystem operations.
pub const FILESYSTEM_SOURCE: &str = "filesystem";
/// Source attributed to operations re-run by [`SafetyFramework::handle_uncertainty_halt`].
pub const RETRY_SOURCE: &str = "retry";
/// Application records counted as recent activity by the health check.
const HEALTH_ACTIVITY_WINDOW: usize = 10;

type PromptRewriter = Box<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// What to do with a halted outcome.
#[derive(Default)]
pub struct HaltRetryOptions {
    pub auto_retry: bool,
    /// Builds the new prompt from the halted raw response.
    pub rewrite: Option<PromptRewriter>,
}

impl HaltRetryOptions {
    /// Auto-retry with a prompt derived from the halted response.
    pub fn rewrite_with<F>(rewrite: F) -> Self
    where
        F: Fn(Option<&str>) -> String + Send + Sync + 'static,
    {
        Self {
            auto_retry: true,
            rewrite: Some(Box::new(rewrite)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of [`SafetyFramework::health_check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ExecutionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_activity: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facade over the whole pipeline.
pub struct SafetyFramework<G: Generator> {
    config: FrameworkConfig,
    audit: AuditTrail,
    gate: Arc<ConfidenceGate>,
    orchestrator: RetryOrchestrator<G>,
    shutdown: CancellationToken,
}

impl<G: Generator> SafetyFramework<G> {
    /// Validate `config`, wire the components and write the initialization
    /// record.
    pub async fn new(config: FrameworkConfig, log: Arc<dyn AuditLog>, generator: G) -> Result<Self> {
        let framework = Self::open(config, log, generator)?;
        framework
            .audit
            .info(
                "Certitude framework initialized",
                None,
                json!({ "config": framework.config }),
            )
            .await?;
        Ok(framework)
    }

    /// Wire the components without touching the audit trail, for callers
    /// that only inspect it.
    pub fn open(config: FrameworkConfig, log: Arc<dyn AuditLog>, generator: G) -> Result<Self> {
        config.validate()?;

        let audit = AuditTrail::new(log).with_console_echo(config.console_echo);
        let keywords = KeywordSet::default();
        for phrase in &config.extra_keywords {
            keywords.add(phrase);
        }
        let gate = Arc::new(
            ConfidenceGate::new(audit.clone())
                .with_keywords(Arc::new(keywords))
                .with_default_source(config.default_source.clone()),
        );
        let orchestrator = RetryOrchestrator::new(generator, Arc::clone(&gate), config.retry_policy());

        Ok(Self {
            config,
            audit,
            gate,
            orchestrator,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<ConfidenceGate> {
        &self.gate
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Token for one caller-cancellable operation. Cancelling it stops only
    /// that operation; [`emergency_stop`](Self::emergency_stop) cancels it too.
    pub fn operation_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Classify one response without invoking the generator.
    pub async fn evaluate(
        &self,
        raw: Option<&str>,
        ctx: &OperationContext,
    ) -> Result<ClassificationOutcome> {
        Ok(self.gate.evaluate(raw, ctx, None, None).await?)
    }

    pub async fn execute(&self, prompt: &str, ctx: &OperationContext) -> Result<ClassificationOutcome> {
        Ok(self
            .orchestrator
            .execute_with_cancel(prompt, ctx, &self.shutdown)
            .await?)
    }

    /// Execute with a token obtained from [`operation_token`](Self::operation_token).
    pub async fn execute_with_cancel(
        &self,
        prompt: &str,
        ctx: &OperationContext,
        cancel: &CancellationToken,
    ) -> Result<ClassificationOutcome> {
        Ok(self
            .orchestrator
            .execute_with_cancel(prompt, ctx, cancel)
            .await?)
    }

    pub async fn execute_with_validation(
        &self,
        prompt: &str,
        schema: Schema,
        ctx: &OperationContext,
    ) -> Result<ClassificationOutcome> {
        let ctx = ctx.clone().expect_json().with_schema(schema);
        self.execute(prompt, &ctx).await
    }

    /// Run a filesystem operation through the generator.
    pub async fn file_operation(
        &self,
        op: FileSystemOperation,
        ctx: &OperationContext,
    ) -> Result<ClassificationOutcome> {
        let mut ctx = ctx
            .clone()
            .with_command(op.command())
            .with_attribute("operation", op.command())
            .with_attribute("path", op.path());
        if ctx.source.is_none() {
            ctx.source = Some(FILESYSTEM_SOURCE.to_string());
        }
        self.execute(&op.prompt(), &ctx).await
    }

    pub async fn create_file(
        &self,
        path: &str,
        content: &str,
        ctx: &OperationContext,
    ) -> Result<ClassificationOutcome> {
        let op = FileSystemOperation::CreateFile {
            path: path.to_string(),
            content: content.to_string(),
        };
        self.file_operation(op, ctx).await
    }

    pub async fn read_file(&self, path: &str, ctx: &OperationContext) -> Result<ClassificationOutcome> {
        let op = FileSystemOperation::ReadFile {
            path: path.to_string(),
        };
        self.file_operation(op, ctx).await
    }

    pub async fn modify_file(
        &self,
        path: &str,
        description: &str,
        ctx: &OperationContext,
    ) -> Result<ClassificationOutcome> {
        let op = FileSystemOperation::ModifyFile {
            path: path.to_string(),
            description: description.to_string(),
        };
        self.file_operation(op, ctx).await
    }

    pub async fn delete_file(&self, path: &str, ctx: &OperationContext) -> Result<ClassificationOutcome> {
        let op = FileSystemOperation::DeleteFile {
            path: path.to_string(),
        };
        self.file_operation(op, ctx).await
    }

    pub async fn list_directory(
        &self,
        path: &str,
        ctx: &OperationContext,
    ) -> Result<ClassificationOutcome> {
        let op = FileSystemOperation::ListDirectory {
            path: path.to_string(),
        };
        self.file_operation(op, ctx).await
    }

    /// Register a phrase and record the change. Returns whether it was new.
    pub async fn add_uncertainty_keyword(&self, phrase: &str) -> Result<bool> {
        let added = self.gate.add_uncertainty_keyword(phrase);
        self.audit
            .info(
                format!("Added uncertainty keyword: {phrase}"),
                None,
                json!({ "keyword": phrase, "changed": added }),
            )
            .await?;
        Ok(added)
    }

    /// Unregister a phrase and record the change. Returns whether it existed.
    pub async fn remove_uncertainty_keyword(&self, phrase: &str) -> Result<bool> {
        let removed = self.gate.remove_uncertainty_keyword(phrase);
        self.audit
            .info(
                format!("Removed uncertainty keyword: {phrase}"),
                None,
                json!({ "keyword": phrase, "changed": removed }),
            )
            .await?;
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<ExecutionStats> {
        Ok(self.collect_stats().await?)
    }

    async fn collect_stats(&self) -> StorageResult<ExecutionStats> {
        let gate = self.gate.stats().await?;
        let recent = self
            .audit
            .log_store()
            .tail(LogKind::Application, self.config.recent_window)
            .await?;
        Ok(ExecutionStats::new(gate, RecentActivity::from_records(&recent)))
    }

    pub async fn uncertainty_halts(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        Ok(self.audit.uncertainty_halts(limit).await?)
    }

    pub async fn search_logs(&self, query: Option<&str>, kind: LogKind) -> Result<Vec<AuditRecord>> {
        Ok(self.audit.search(query, kind).await?)
    }

    pub async fn records_for_operation(&self, operation_id: &OperationId) -> Result<Vec<AuditRecord>> {
        Ok(self.audit.records_for_operation(operation_id).await?)
    }

    pub fn validate_data(&self, data: &Value, schema: &Schema) -> ValidationReport {
        self.gate.validator().is_valid(data, schema)
    }

    /// Re-run a halted operation with a rewritten prompt when asked to;
    /// otherwise hand the outcome back unchanged.
    pub async fn handle_uncertainty_halt(
        &self,
        outcome: ClassificationOutcome,
        options: HaltRetryOptions,
    ) -> Result<ClassificationOutcome> {
        let (halt, rewrite) = match (&outcome, options.auto_retry, &options.rewrite) {
            (ClassificationOutcome::UncertaintyHalt(halt), true, Some(rewrite)) => (halt, rewrite),
            _ => return Ok(outcome),
        };

        let prompt = rewrite(halt.raw_response.as_deref());
        let ctx = OperationContext::new()
            .with_source(RETRY_SOURCE)
            .with_attribute("original_operation_id", halt.operation_id.as_str());
        self.execute(&prompt, &ctx).await
    }

    /// Halt every in-flight operation at its next suspension point and
    /// refuse new ones.
    pub async fn emergency_stop(&self, reason: &str) -> Result<()> {
        self.shutdown.cancel();
        self.audit
            .error(
                "EMERGENCY STOP ACTIVATED",
                None,
                json!({ "reason": reason, "status": "EMERGENCY_HALT" }),
            )
            .await?;
        Ok(())
    }

    /// Component status report. Audit store failures are reported, not
    /// returned.
    pub async fn health_check(&self) -> HealthReport {
        let timestamp = Utc::now();
        let probe = async {
            let stats = self.collect_stats().await?;
            let recent = self
                .audit
                .log_store()
                .tail(LogKind::Application, HEALTH_ACTIVITY_WINDOW)
                .await?;
            Ok::<_, StorageError>((stats, recent.len()))
        };

        match probe.await {
            Ok((stats, recent_activity)) => {
                let orchestrator = if self.is_stopped() { "stopped" } else { "operational" };
                let components = BTreeMap::from([
                    ("audit_log".to_string(), "operational".to_string()),
                    ("confidence_gate".to_string(), "operational".to_string()),
                    ("retry_orchestrator".to_string(), orchestrator.to_string()),
                ]);
                HealthReport {
                    status: HealthStatus::Healthy,
                    timestamp,
                    stats: Some(stats),
                    recent_activity: Some(recent_activity),
                    components,
                    error: None,
                }
            }
            Err(err) => HealthReport {
                status: HealthStatus::Unhealthy,
                timestamp,
                stats: None,
                recent_activity: None,
                components: BTreeMap::new(),
                error: Some(err.to_string()),
            },
        }
    }
}
