//! External script validation
//!
//! sqlforge never talks to the warehouse itself. A validator is any command
//! that accepts the script on stdin and exits non-zero with the warehouse
//! error on stderr when the script fails, e.g. `bq query --dry_run`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Passed,
    Failed { diagnostic: String },
}

#[async_trait]
pub trait ScriptValidator: Send + Sync {
    async fn validate(&self, script: &str) -> Result<Validation>;
}

/// Runs a shell command per script
pub struct CommandValidator {
    command: String,
}

impl CommandValidator {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl ScriptValidator for CommandValidator {
    async fn validate(&self, script: &str) -> Result<Validation> {
        debug!("Running validator: {}", self.command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start validator '{}'", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            // a validator may exit without reading its input
            if let Err(e) = stdin.write_all(script.as_bytes()).await {
                debug!("Validator closed stdin early: {}", e);
            }
        }

        let output = child.wait_with_output().await.context("Validator did not finish")?;
        if output.status.success() {
            return Ok(Validation::Passed);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostic = if stderr.is_empty() {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if stdout.is_empty() {
                format!("validator exited with {}", output.status)
            } else {
                stdout
            }
        } else {
            stderr
        };
        Ok(Validation::Failed { diagnostic })
    }
}
