//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with guaranteed timeout and kill on all platforms.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::application::ports::CommandRunner;
use crate::domain::env::EnvPatch;

/// Default timeout for captured commands (agent control, stack outputs, tests).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(120);

/// Production `CommandRunner`. Uses tokio for async process execution
/// with guaranteed timeout and kill on all platforms.
///
/// `tokio::time::timeout` around `.output().await` would drop the future but
/// leave the OS process running. This implementation uses `tokio::select!`
/// with explicit `child.kill()` to guarantee the process is terminated.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(program: &str, args: &[&str], env: &EnvPatch) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).envs(env.iter()).kill_on_drop(true);
        cmd
    }

    async fn collect(
        program: &str,
        mut child: Child,
        timeout: Duration,
    ) -> Result<Output> {
        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str], env: &EnvPatch) -> Result<Output> {
        self.run_with_timeout(program, args, env, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvPatch,
        timeout: Duration,
    ) -> Result<Output> {
        tracing::debug!(program, ?args, "run");
        let child = Self::command(program, args, env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        Self::collect(program, child, timeout).await
    }

    fn spawn(&self, program: &str, args: &[&str], env: &EnvPatch) -> Result<Child> {
        tracing::debug!(program, ?args, "spawn");
        Self::command(program, args, env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))
    }

    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvPatch,
    ) -> Result<std::process::ExitStatus> {
        tracing::debug!(program, ?args, "run interactive");
        let mut child = Self::command(program, args, env)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}
