//! Background forwarding session: a long-lived `ssh` coprocess.
//!
//! The remote side echoes a readiness line and then blocks reading stdin.
//! The session counts as up only once that line is read back; closing
//! writes a newline so the remote `read` returns and `ssh` exits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};

use crate::application::ports::CommandRunner;
use crate::domain::config::OpsConfig;
use crate::domain::env::EnvPatch;
use crate::domain::error::TunnelError;
use crate::infra::scope::ResourceScope;

/// Line the remote side prints once the connection is up.
pub const READY: &str = "opskit-tunnel-ready";

/// Remote command keeping the session open until stdin yields a line.
#[must_use]
pub fn remote_command() -> String {
    format!("echo {READY}; read _")
}

/// Bounds on the handshake and on waiting for exit after close.
#[derive(Debug, Clone, Copy)]
pub struct TunnelTimeouts {
    pub handshake: Duration,
    pub close: Duration,
}

impl TunnelTimeouts {
    #[must_use]
    pub fn from_config(config: &OpsConfig) -> Self {
        Self {
            handshake: config.timeouts.handshake(),
            close: config.timeouts.close(),
        }
    }
}

/// Observable lifecycle of a session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Closed,
}

struct Running {
    child: Child,
    // Held so late output from ssh never hits a closed pipe.
    _stdout: BufReader<ChildStdout>,
}

struct Inner {
    program: String,
    pid: Option<u32>,
    close_timeout: Duration,
    running: Mutex<Option<Running>>,
}

/// Handle to a running coprocess. Clones share the same process.
#[derive(Clone)]
pub struct BackgroundSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BackgroundSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSession")
            .field("program", &self.inner.program)
            .field("pid", &self.inner.pid)
            .field("state", &self.state())
            .finish()
    }
}

impl BackgroundSession {
    /// Spawns `program args... <remote command>` and waits for the readiness
    /// line. On success the session's `close` is registered with `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or a `TunnelError`
    /// if the readiness line is wrong, missing, or late. The child is killed
    /// in every failure case.
    pub async fn run<R: CommandRunner>(
        scope: &ResourceScope,
        runner: &R,
        program: &str,
        args: &[String],
        env: &EnvPatch,
        timeouts: TunnelTimeouts,
    ) -> Result<Self> {
        let remote = remote_command();
        let mut argv: Vec<&str> = args.iter().map(String::as_str).collect();
        argv.push(&remote);

        let mut child = runner.spawn(program, &argv, env)?;
        let pid = child.id();
        tracing::debug!(program, ?pid, "waiting for readiness line");

        let Some(stdout) = child.stdout.take() else {
            kill(&mut child).await;
            anyhow::bail!("{program} was spawned without a stdout pipe");
        };
        let mut stdout = BufReader::new(stdout);
        if let Err(e) = handshake(&mut stdout, timeouts.handshake).await {
            kill(&mut child).await;
            return Err(e);
        }
        tracing::info!(program, ?pid, "background session up");

        let session = Self {
            inner: Arc::new(Inner {
                program: program.to_string(),
                pid,
                close_timeout: timeouts.close,
                running: Mutex::new(Some(Running {
                    child,
                    _stdout: stdout,
                })),
            }),
        };
        let handle = session.clone();
        scope.trigger(format!("close {program} session"), move || async move {
            handle.close().await
        });
        Ok(session)
    }

    /// Signals the remote side to finish and waits for the process to exit.
    /// The process is killed if it outlives the close timeout. Closing a
    /// closed session does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails or the process had to be killed.
    pub async fn close(&self) -> Result<()> {
        let taken = self.lock_running().take();
        let Some(Running { mut child, _stdout }) = taken else {
            return Ok(());
        };
        let program = &self.inner.program;

        if let Some(mut stdin) = child.stdin.take() {
            // ssh may already be gone; a broken pipe here is not a close failure.
            let _ = stdin.write_all(b"\n").await;
            let _ = stdin.shutdown().await;
        }

        let timeout = self.inner.close_timeout;
        if let Ok(status) = tokio::time::timeout(timeout, child.wait()).await {
            let status = status.with_context(|| format!("waiting for {program}"))?;
            tracing::info!(program = %program, %status, "background session closed");
            return Ok(());
        }
        tracing::warn!(program = %program, "background session did not exit, killing");
        child
            .kill()
            .await
            .with_context(|| format!("killing {program}"))?;
        anyhow::bail!("{program} did not exit within {}s and was killed", timeout.as_secs())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.lock_running().is_some() {
            SessionState::Running
        } else {
            SessionState::Closed
        }
    }

    /// OS process id of the coprocess.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn handshake(stdout: &mut BufReader<ChildStdout>, timeout: Duration) -> Result<()> {
    let mut line = String::new();
    let read = tokio::time::timeout(timeout, stdout.read_line(&mut line))
        .await
        .map_err(|_| TunnelError::HandshakeTimeout(timeout.as_secs()))?
        .context("reading readiness line")?;
    if read == 0 {
        return Err(TunnelError::HandshakeEof.into());
    }
    let got = line.trim_end_matches(['\r', '\n']);
    if got != READY {
        return Err(TunnelError::HandshakeMismatch {
            expected: READY.to_string(),
            got: got.to_string(),
        }
        .into());
    }
    Ok(())
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "cannot kill background process");
    }
}
