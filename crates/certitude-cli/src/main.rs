//! Certitude CLI
//!
//! The `certitude` command gates generator responses and inspects the audit
//! trail they leave behind.
//!
//! ## Commands
//!
//! - `evaluate`: classify one response without calling a generator
//! - `run`: execute an operation through an external command
//! - `halts`: show recent uncertainty halts
//! - `search`: search a log by substring
//! - `stats`: halt statistics and recent success rate
//! - `health`: component health report
//! - `keywords`: list active uncertainty keywords

mod command_generator;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use audit_ledger::{JsonlAuditLog, SurrealAuditLog};
use certitude_core::metrics::METRICS;
use certitude_core::telemetry::init_tracing;
use certitude_core::{
    AuditLog, AuditRecord, ClassificationOutcome, FrameworkConfig, Generator, HealthStatus,
    LogKind, OperationContext, SafetyFramework, Schema,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing::{info, Level};

use command_generator::{CommandGenerator, NoGenerator};

/// Exit code for a response that was halted rather than accepted.
const EXIT_HALTED: u8 = 2;

#[derive(Parser)]
#[command(name = "certitude")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Confidence gate and audit trail for text generator output", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "CERTITUDE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for JSON-lines audit logs (overrides the config file)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Audit store backend
    #[arg(long, global = true, value_enum, default_value = "jsonl", env = "CERTITUDE_STORE")]
    store: StoreKind,

    /// SurrealDB endpoint for `--store surreal`
    #[arg(long, global = true, env = "SURREALDB_URL")]
    surreal_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Jsonl,
    Surreal,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one response and print the outcome
    Evaluate {
        /// File holding the response, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        response: String,

        /// Treat the response as a JSON document
        #[arg(long)]
        expect_json: bool,

        /// JSON schema document the response must satisfy
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Source attributed in the audit record
        #[arg(long)]
        source: Option<String>,

        /// Additional uncertainty keyword (repeatable)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },

    /// Execute an operation using an external command as the generator
    Run {
        /// Shell command; receives the prompt on stdin, answers on stdout
        #[arg(short, long)]
        command: String,

        /// Prompt text, or `@path` to read it from a file
        #[arg(short, long)]
        prompt: String,

        #[arg(long)]
        max_retries: Option<u32>,

        #[arg(long)]
        retry_delay_ms: Option<u64>,

        /// Per-attempt timeout in milliseconds (0 disables)
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(long)]
        expect_json: bool,

        #[arg(long)]
        schema: Option<PathBuf>,

        #[arg(long)]
        source: Option<String>,

        /// Retry attempts that end in an uncertainty halt
        #[arg(long)]
        retry_on_uncertainty: bool,
    },

    /// Show recent uncertainty halts
    Halts {
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Search a log for records containing a substring
    Search {
        query: Option<String>,

        /// application, errors or halts
        #[arg(short, long, default_value = "application")]
        log: LogKind,
    },

    /// Show halt statistics and recent success rate
    Stats,

    /// Report component health
    Health,

    /// List active uncertainty keywords
    Keywords,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let mut config = FrameworkConfig::resolve(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }
    let store = open_store(cli.store, cli.surreal_url.as_deref(), &config.log_dir).await?;

    let code = match cli.command {
        Commands::Evaluate {
            response,
            expect_json,
            schema,
            source,
            keywords,
        } => {
            config.extra_keywords.extend(keywords);
            let ctx = operation_context(expect_json, schema.as_deref(), source)?;
            cmd_evaluate(config, store, &response, &ctx).await
        }
        Commands::Run {
            command,
            prompt,
            max_retries,
            retry_delay_ms,
            timeout_ms,
            expect_json,
            schema,
            source,
            retry_on_uncertainty,
        } => {
            if let Some(n) = max_retries {
                config.max_retries = n;
            }
            if let Some(ms) = retry_delay_ms {
                config.retry_delay_ms = ms;
            }
            if let Some(ms) = timeout_ms {
                config.generator_timeout_ms = ms;
            }
            let mut ctx = operation_context(expect_json, schema.as_deref(), source)?
                .with_command(command.clone());
            if retry_on_uncertainty {
                ctx = ctx.retry_on_uncertainty();
            }
            cmd_run(config, store, CommandGenerator::new(command), &prompt, &ctx).await
        }
        Commands::Halts { limit } => cmd_halts(&inspector(config, store)?, limit).await,
        Commands::Search { query, log } => {
            cmd_search(&inspector(config, store)?, query.as_deref(), log).await
        }
        Commands::Stats => cmd_stats(&inspector(config, store)?).await,
        Commands::Health => cmd_health(&inspector(config, store)?).await,
        Commands::Keywords => cmd_keywords(&inspector(config, store)?),
    };

    METRICS.flush();
    code
}

async fn open_store(
    kind: StoreKind,
    surreal_url: Option<&str>,
    log_dir: &Path,
) -> Result<Arc<dyn AuditLog>> {
    let store: Arc<dyn AuditLog> = match kind {
        StoreKind::Jsonl => Arc::new(
            JsonlAuditLog::open(log_dir)
                .with_context(|| format!("Failed to open audit logs in {}", log_dir.display()))?,
        ),
        StoreKind::Surreal => {
            let log = match surreal_url {
                Some(url) => SurrealAuditLog::connect(url).await,
                None => SurrealAuditLog::from_env().await,
            };
            Arc::new(log.context("Failed to connect to audit database")?)
        }
    };
    Ok(store)
}

/// Framework used by commands that never call a generator.
fn inspector(
    config: FrameworkConfig,
    store: Arc<dyn AuditLog>,
) -> Result<SafetyFramework<NoGenerator>> {
    SafetyFramework::open(config, store, NoGenerator).context("Failed to initialize framework")
}

fn operation_context(
    expect_json: bool,
    schema: Option<&Path>,
    source: Option<String>,
) -> Result<OperationContext> {
    let mut ctx = OperationContext::new();
    if expect_json {
        ctx = ctx.expect_json();
    }
    if let Some(path) = schema {
        ctx = ctx.with_schema(load_schema(path)?);
    }
    if let Some(source) = source {
        ctx = ctx.with_source(source);
    }
    Ok(ctx)
}

fn load_schema(path: &Path) -> Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    let doc: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Schema {} is not JSON", path.display()))?;
    Schema::from_json(&doc).with_context(|| format!("Invalid schema {}", path.display()))
}

/// Read `-` from stdin, anything else as a file path.
async fn read_response(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read response from stdin")?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read response file {source}"))
}

/// Literal prompt text, or the contents of a file for `@path`.
async fn read_prompt(prompt: &str) -> Result<String> {
    match prompt.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt file {path}")),
        None => Ok(prompt.to_string()),
    }
}

fn outcome_exit(outcome: &ClassificationOutcome) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_HALTED)
    })
}

async fn cmd_evaluate(
    config: FrameworkConfig,
    store: Arc<dyn AuditLog>,
    response: &str,
    ctx: &OperationContext,
) -> Result<ExitCode> {
    let raw = read_response(response).await?;
    let framework = inspector(config, store)?;
    let outcome = framework.evaluate(Some(&raw), ctx).await?;
    outcome_exit(&outcome)
}

async fn cmd_run<G: Generator>(
    config: FrameworkConfig,
    store: Arc<dyn AuditLog>,
    generator: G,
    prompt: &str,
    ctx: &OperationContext,
) -> Result<ExitCode> {
    let prompt = read_prompt(prompt).await?;
    let framework = SafetyFramework::new(config, store, generator)
        .await
        .context("Failed to initialize framework")?;

    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let outcome = execute_until(&framework, &prompt, ctx, interrupt).await?;
    outcome_exit(&outcome)
}

/// Execute, turning `interrupt` into an emergency stop. The operation keeps
/// running until it writes its own cancellation record.
async fn execute_until<G, F>(
    framework: &SafetyFramework<G>,
    prompt: &str,
    ctx: &OperationContext,
    interrupt: F,
) -> Result<ClassificationOutcome>
where
    G: Generator,
    F: Future<Output = ()>,
{
    let execution = framework.execute(prompt, ctx);
    tokio::pin!(execution);

    tokio::select! {
        outcome = &mut execution => return Ok(outcome?),
        () = interrupt => {
            info!("Interrupted; cancelling operation");
            framework.emergency_stop("interrupted").await?;
        }
    }
    Ok(execution.await?)
}

fn print_records(records: &[AuditRecord]) -> Result<()> {
    if records.is_empty() {
        println!("No matching records");
        return Ok(());
    }
    for record in records {
        println!("{}", record.to_line()?);
    }
    Ok(())
}

async fn cmd_halts<G: Generator>(framework: &SafetyFramework<G>, limit: usize) -> Result<ExitCode> {
    print_records(&framework.uncertainty_halts(limit).await?)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_search<G: Generator>(
    framework: &SafetyFramework<G>,
    query: Option<&str>,
    log: LogKind,
) -> Result<ExitCode> {
    print_records(&framework.search_logs(query, log).await?)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_stats<G: Generator>(framework: &SafetyFramework<G>) -> Result<ExitCode> {
    let stats = framework.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_health<G: Generator>(framework: &SafetyFramework<G>) -> Result<ExitCode> {
    let report = framework.health_check().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(match report.status {
        HealthStatus::Healthy => ExitCode::SUCCESS,
        HealthStatus::Unhealthy => ExitCode::FAILURE,
    })
}

fn cmd_keywords<G: Generator>(framework: &SafetyFramework<G>) -> Result<ExitCode> {
    for keyword in framework.gate().keywords().list() {
        println!("{keyword}");
    }
    Ok(ExitCode::SUCCESS)
}
