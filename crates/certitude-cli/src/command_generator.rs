//! Generator backed by an external shell command.
//!
//! The prompt is written to the command's stdin and the response is read
//! from its stdout. A non-zero exit status is a generator fault carrying
//! the captured stderr as its trace.

use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use certitude_core::{GenerationRequest, Generator, GeneratorError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the operation id to the command.
pub const ENV_OPERATION_ID: &str = "CERTITUDE_OPERATION_ID";
/// Environment variable carrying the 1-based attempt number.
pub const ENV_ATTEMPT: &str = "CERTITUDE_ATTEMPT";

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self, prompt: &str, request: &GenerationRequest) -> anyhow::Result<std::process::Output> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(ENV_OPERATION_ID, request.operation_id.as_str())
            .env(ENV_ATTEMPT, request.attempt.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn generator command `{}`", self.command()))?;

        // Stdin is fed while stdout drains.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A command that ignores its input may close stdin early.
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(error = %e, "generator command closed stdin");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        output.context("failed to wait for generator command")
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn invoke(
        &self,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<String, GeneratorError> {
        let output = self.run(prompt, request).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GeneratorError::Failed {
                message: format!("command exited with {}", output.status),
                trace: (!stderr.is_empty()).then_some(stderr),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Stand-in for commands that only inspect the audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGenerator;

#[async_trait]
impl Generator for NoGenerator {
    async fn invoke(
        &self,
        _prompt: &str,
        _request: &GenerationRequest,
    ) -> Result<String, GeneratorError> {
        Err(GeneratorError::failed("no generator command configured"))
    }
}
