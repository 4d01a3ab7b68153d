//! Certitude Core Library
//!
//! Decides whether a response from a non-deterministic text generator is
//! trustworthy enough to act on, retries failing attempts with linear
//! backoff, and records every decision in an append-only audit trail.
//!
//! Pipeline: caller → [`RetryOrchestrator`] → generator → [`ConfidenceGate`]
//! → [`AuditTrail`].

pub mod audit;
pub mod config;
pub mod confidence_gate;
pub mod domain;
pub mod framework;
pub mod generator;
pub mod keywords;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod prompts;
pub mod stats;
pub mod telemetry;
pub mod validator;

pub use audit::AuditTrail;
pub use config::{ConfigError, FrameworkConfig};
pub use confidence_gate::{ConfidenceGate, Verdict, DEFAULT_SOURCE};
pub use domain::{
    CertitudeError, ClassificationOutcome, HaltCode, OperationContext, OutcomeStatus,
    ResponseData, Result, UncertaintyHalt,
};
pub use framework::{HaltRetryOptions, HealthReport, HealthStatus, SafetyFramework};
pub use generator::{GenerationRequest, Generator, GeneratorError};
pub use keywords::{KeywordSet, DEFAULT_KEYWORDS};
pub use orchestrator::{RetryOrchestrator, RetryPolicy};
pub use prompts::FileSystemOperation;
pub use stats::{ExecutionStats, GateStats, RecentActivity};
pub use validator::{
    common as common_schemas, CustomPredicate, FieldSchema, Schema, SchemaError, SchemaValidator,
    ValidationReport, ValueType, Violation, ViolationCode,
};

pub use audit_ledger::{AuditLog, AuditRecord, LogKind, OperationId, Severity, StorageError};
pub use tokio_util::sync::CancellationToken;
