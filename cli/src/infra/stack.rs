//! Infrastructure implementation of the `StackProvider` port.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::application::ports::{CommandRunner, StackProvider};
use crate::domain::env::EnvPatch;
use crate::domain::error::StackError;

/// Runs a command that prints the stack outputs as a JSON object.
pub struct CommandStackProvider<'a, R> {
    runner: &'a R,
    command: Vec<String>,
    env: EnvPatch,
    timeout: Duration,
}

impl<'a, R: CommandRunner> CommandStackProvider<'a, R> {
    #[must_use]
    pub fn new(runner: &'a R, command: Vec<String>, env: EnvPatch, timeout: Duration) -> Self {
        Self {
            runner,
            command,
            env,
            timeout,
        }
    }
}

impl<R: CommandRunner> StackProvider for CommandStackProvider<'_, R> {
    async fn outputs(&self) -> Result<Value> {
        let (program, args) = self
            .command
            .split_first()
            .context("stack output command is empty")?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = self
            .runner
            .run_with_timeout(program, &args, &self.env, self.timeout)
            .await
            .context("cannot read stack outputs")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let value: Value = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("{program} did not print valid JSON"))?;
        if !value.is_object() {
            return Err(StackError::NotAnObject.into());
        }
        tracing::debug!(outputs = value.as_object().map_or(0, serde_json::Map::len), "stack outputs loaded");
        Ok(value)
    }
}
