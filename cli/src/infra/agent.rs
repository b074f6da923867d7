//! Credential agent session: one `ssh-agent` per resource scope.
//!
//! `AgentSession::begin` starts the agent with its socket inside a private
//! directory of the scope's arena, records the agent's startup output in
//! `agent.env`, and registers `end` as a cleanup action. The session's
//! environment patch is handed explicitly to every child that needs the
//! agent; the process environment is left alone.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::application::ports::CommandRunner;
use crate::domain::config::OpsConfig;
use crate::domain::env::{AGENT_PID_VAR, EnvPatch, parse_agent_output, scan_agent_output};
use crate::domain::error::AgentError;
use crate::infra::fs::{PRIVATE_DIR_MODE, remove_dir_if_exists, write_private};
use crate::infra::scope::{ResourceScope, TempOptions};

/// Scope slot held while a session is active.
pub const AGENT_SLOT: &str = "ssh-agent";
/// File in the private directory holding the agent's startup output.
pub const AGENT_ENV_FILE: &str = "agent.env";
/// Socket name in the private directory.
pub const AGENT_SOCKET: &str = "agent.sock";

/// Label used for keys read from standard input.
pub const STDIN_LABEL: &str = "<stdin>";

/// Programs and timeout used by the agent session.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub agent_program: String,
    pub add_program: String,
    pub timeout: Duration,
}

impl AgentSettings {
    #[must_use]
    pub fn from_config(config: &OpsConfig) -> Self {
        Self {
            agent_program: config.ssh.agent_program.clone(),
            add_program: config.ssh.add_program.clone(),
            timeout: config.timeouts.agent(),
        }
    }
}

/// Result of registering one key.
#[derive(Debug)]
pub struct KeyOutcome {
    pub source: String,
    pub result: Result<()>,
}

/// Per-key results of an add operation, in input order.
#[derive(Debug, Default)]
pub struct KeyAddReport {
    pub outcomes: Vec<KeyOutcome>,
}

impl KeyAddReport {
    #[must_use]
    pub fn added(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.added()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Debug)]
struct ActiveAgent {
    pid: u32,
    env: EnvPatch,
    dir: PathBuf,
}

struct Inner<R> {
    runner: Arc<R>,
    scope: Arc<ResourceScope>,
    settings: AgentSettings,
    active: Mutex<Option<ActiveAgent>>,
}

/// Handle to the scope's agent session. Clones share the same session.
pub struct AgentSession<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for AgentSession<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for AgentSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl<R> AgentSession<R>
where
    R: CommandRunner + Send + Sync + 'static,
{
    /// Starts an agent and registers its teardown with `scope`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::AlreadyActive` if the scope already has a session,
    /// or a launch error if the agent does not start and report its
    /// environment within the configured timeout.
    pub async fn begin(
        scope: &Arc<ResourceScope>,
        runner: Arc<R>,
        settings: AgentSettings,
    ) -> Result<Self> {
        if !scope.claim(AGENT_SLOT) {
            return Err(AgentError::AlreadyActive.into());
        }
        let active = match launch(scope, runner.as_ref(), &settings).await {
            Ok(active) => active,
            Err(e) => {
                scope.release(AGENT_SLOT);
                return Err(e);
            }
        };
        tracing::info!(pid = active.pid, "ssh-agent started");

        let session = Self {
            inner: Arc::new(Inner {
                runner,
                scope: Arc::clone(scope),
                settings,
                active: Mutex::new(Some(active)),
            }),
        };
        let handle = session.clone();
        scope.trigger("end ssh-agent session", move || async move { handle.end().await });
        Ok(session)
    }

    /// Registers each key file with the agent through a single-use scratch
    /// copy. Failures are reported per key. With no paths, one credential
    /// is read from standard input instead.
    pub async fn add_keys(&self, paths: &[PathBuf]) -> KeyAddReport {
        self.add_keys_or_read(paths, tokio::io::stdin()).await
    }

    /// Like `add_keys`, reading the single credential from `fallback` when
    /// `paths` is empty.
    pub async fn add_keys_or_read<Rd>(&self, paths: &[PathBuf], fallback: Rd) -> KeyAddReport
    where
        Rd: AsyncRead + Unpin,
    {
        if paths.is_empty() {
            return self.add_key_from_reader(fallback).await;
        }
        let mut report = KeyAddReport::default();
        for path in paths {
            let source = path.display().to_string();
            let result = match std::fs::read(path) {
                Ok(material) => self.add_key_material(&source, &material).await,
                Err(e) => Err(anyhow::Error::new(e).context(format!("cannot read {source}"))),
            };
            report.outcomes.push(KeyOutcome { source, result });
        }
        report
    }

    /// Reads exactly one credential from standard input and registers it.
    pub async fn add_key_from_stdin(&self) -> KeyAddReport {
        self.add_key_from_reader(tokio::io::stdin()).await
    }

    /// Reads one credential from `reader` until EOF and registers it.
    pub async fn add_key_from_reader<Rd>(&self, mut reader: Rd) -> KeyAddReport
    where
        Rd: AsyncRead + Unpin,
    {
        let mut material = Vec::new();
        let result = match reader.read_to_end(&mut material).await {
            Ok(_) => self.add_key_material(STDIN_LABEL, &material).await,
            Err(e) => Err(anyhow::Error::new(e).context("cannot read key from stdin")),
        };
        KeyAddReport {
            outcomes: vec![KeyOutcome {
                source: STDIN_LABEL.to_string(),
                result,
            }],
        }
    }

    /// Registers one credential. The scratch file holding it is removed
    /// before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::NotActive` after `end`, `AgentError::KeyRejected`
    /// if the add program refuses the key, or an I/O error.
    pub async fn add_key_material(&self, source: &str, material: &[u8]) -> Result<()> {
        use std::io::Write as _;

        let env = self.env();
        if env.is_empty() {
            return Err(AgentError::NotActive.into());
        }

        let mut scratch = self.inner.scope.scratch_file()?;
        scratch
            .write_all(material)
            .and_then(|()| {
                if material.ends_with(b"\n") {
                    Ok(())
                } else {
                    scratch.write_all(b"\n")
                }
            })
            .and_then(|()| scratch.flush())
            .context("cannot write scratch key file")?;
        let path = scratch.path().to_string_lossy().into_owned();

        let settings = &self.inner.settings;
        let result = self
            .inner
            .runner
            .run_with_timeout(&settings.add_program, &[&path], &env, settings.timeout)
            .await;
        scratch.close().context("cannot remove scratch key file")?;

        let output = result?;
        if !output.status.success() {
            // The add program's stderr may echo key material; keep it out of logs.
            tracing::warn!(key = source, status = %output.status, "key rejected");
            return Err(AgentError::KeyRejected {
                source_label: source.to_string(),
                status: output.status.to_string(),
            }
            .into());
        }
        tracing::info!(key = source, "key added");
        Ok(())
    }

    /// Stops the agent, reverts the patch and releases the scope slot.
    /// Does nothing if the session already ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent could not be stopped or its directory
    /// removed; the session is considered ended either way.
    pub async fn end(&self) -> Result<()> {
        let taken = self.lock_active().take();
        let Some(active) = taken else {
            return Ok(());
        };
        tracing::info!(pid = active.pid, "stopping ssh-agent");

        let settings = &self.inner.settings;
        let result = self
            .inner
            .runner
            .run_with_timeout(&settings.agent_program, &["-k"], &active.env, settings.timeout)
            .await;
        self.inner.scope.release(AGENT_SLOT);
        remove_dir_if_exists(&active.dir)?;

        let output = result.context("cannot stop ssh-agent")?;
        anyhow::ensure!(
            output.status.success(),
            "{} -k exited with {}",
            settings.agent_program,
            output.status
        );
        Ok(())
    }
}

impl<R> AgentSession<R> {
    /// The patch children need to reach the agent; empty once ended.
    #[must_use]
    pub fn env(&self) -> EnvPatch {
        self.lock_active()
            .as_ref()
            .map(|a| a.env.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.lock_active().as_ref().map(|a| a.pid)
    }

    /// Private directory holding the socket and `agent.env`.
    #[must_use]
    pub fn dir(&self) -> Option<PathBuf> {
        self.lock_active().as_ref().map(|a| a.dir.clone())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveAgent>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn launch<R: CommandRunner>(
    scope: &ResourceScope,
    runner: &R,
    settings: &AgentSettings,
) -> Result<ActiveAgent> {
    let dir = scope.temp_dir(&TempOptions::prefix("agent.").with_mode(PRIVATE_DIR_MODE))?;
    let socket = dir.join(AGENT_SOCKET).to_string_lossy().into_owned();

    let output = runner
        .run_with_timeout(
            &settings.agent_program,
            &["-s", "-a", &socket],
            &EnvPatch::new(),
            settings.timeout,
        )
        .await
        .map_err(|e| AgentError::LaunchFailed(format!("{e:#}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AgentError::LaunchFailed(format!(
            "{} exited with {}: {}",
            settings.agent_program,
            output.status,
            stderr.trim()
        ))
        .into());
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let recorded = write_private(&dir.join(AGENT_ENV_FILE), text.as_bytes())
        .and_then(|()| parse_agent_output(&text).map_err(anyhow::Error::from));
    let env = match recorded {
        Ok(env) => env,
        Err(e) => {
            // The agent has already daemonized by now.
            kill_stray_agent(runner, settings, &text).await;
            return Err(e);
        }
    };
    let pid = env
        .get(AGENT_PID_VAR)
        .and_then(|p| p.parse().ok())
        .ok_or(AgentError::MissingVariable(AGENT_PID_VAR))?;
    Ok(ActiveAgent { pid, env, dir })
}

/// Stops an agent whose startup output could not be recorded, if its pid
/// can still be read from that output.
async fn kill_stray_agent<R: CommandRunner>(runner: &R, settings: &AgentSettings, text: &str) {
    let scanned = scan_agent_output(text);
    let Some(pid) = scanned.get(AGENT_PID_VAR).filter(|p| p.parse::<u32>().is_ok()) else {
        tracing::warn!("ssh-agent output has no pid; cannot stop it");
        return;
    };
    let env = EnvPatch::new().with(AGENT_PID_VAR, pid);
    match runner
        .run_with_timeout(&settings.agent_program, &["-k"], &env, settings.timeout)
        .await
    {
        Ok(output) if output.status.success() => tracing::debug!(pid, "stray ssh-agent stopped"),
        Ok(output) => tracing::warn!(pid, status = %output.status, "cannot stop stray ssh-agent"),
        Err(e) => tracing::warn!(pid, error = %e, "cannot stop stray ssh-agent"),
    }
}

/// Reads the recorded agent environment back from `dir`.
///
/// # Errors
///
/// Returns an error if the file is missing or does not hold a valid patch.
pub fn read_agent_env(dir: &Path) -> Result<EnvPatch> {
    let path = dir.join(AGENT_ENV_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_agent_output(&text)?)
}
