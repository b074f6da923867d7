//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::{EnvPatch, OpsConfig};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// Every method takes the environment patch to apply to the child; the
/// caller's own environment is inherited underneath it.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str], env: &EnvPatch) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvPatch,
        timeout: Duration,
    ) -> Result<Output>;
    /// Spawn a program with piped stdin/stdout without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn(&self, program: &str, args: &[&str], env: &EnvPatch) -> Result<tokio::process::Child>;
    /// Run a program with inherited stdio and return only its exit status.
    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvPatch,
    ) -> Result<std::process::ExitStatus>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when no file exists.
    fn load(&self) -> Result<OpsConfig>;
    /// Location of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}

// ── Stack Output Port ─────────────────────────────────────────────────────────

/// Abstracts the cloud stack/state provider that knows hosts and keys.
#[allow(async_fn_in_trait)]
pub trait StackProvider {
    /// Fetch the stack outputs as a JSON object.
    async fn outputs(&self) -> Result<serde_json::Value>;
}
