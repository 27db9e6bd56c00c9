//! Subprocess Pipeline Engine.
//!
//! Calls an external engine binary:
//! - `<command> <args> install <bundle> <config_dir>` prints the installed
//!   configuration as JSON on stdout
//! - `<command> <args> execute` reads the run request as JSON on stdin

use std::path::Path;
use std::process::{Output, Stdio};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{InstalledConfiguration, PipelineEngine};
use crate::config::EngineSettings;
use crate::domain::PipelineRunRequest;

/// Pipeline Engine backed by an external command
pub struct CommandEngine {
    /// Engine binary (default: "okapi-engine")
    command: String,

    /// Arguments placed before the subcommand
    args: Vec<String>,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl CommandEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.command.clone(), settings.args.clone())
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).arg(subcommand);
        cmd
    }

    fn check_status(&self, subcommand: &str, output: &Output) -> Result<()> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Engine '{}' {} failed with exit code {}: {}",
                self.command,
                subcommand,
                exit_code,
                stderr.trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.command
    }

    async fn install_configuration(
        &self,
        bundle: &Path,
        config_dir: &Path,
    ) -> Result<InstalledConfiguration> {
        let output = self
            .command("install")
            .arg(bundle)
            .arg(config_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to spawn engine '{}'", self.command))?;

        self.check_status("install", &output)?;

        let installed: InstalledConfiguration = serde_json::from_slice(&output.stdout)
            .context("Engine install output is not a valid configuration")?;

        debug!(
            steps = installed.steps.len(),
            mappings = installed.filter_mappings.len(),
            "Engine installed configuration"
        );
        Ok(installed)
    }

    async fn execute(&self, request: &PipelineRunRequest) -> Result<()> {
        let payload = serde_json::to_vec(request).context("Failed to serialize run request")?;

        let mut child = self
            .command("execute")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn engine '{}'", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            // An engine that exits early closes the pipe; its exit status tells the story
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("Engine closed stdin before reading the request");
                }
                Err(e) => return Err(e).context("Failed to write to engine stdin"),
            }
            // Drop stdin to signal EOF
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for engine '{}'", self.command))?;

        self.check_status("execute", &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim(), "Engine output");
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let output = self
            .command("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run engine '{}' health check", self.command))?;

        self.check_status("--version", &output)
    }
}
