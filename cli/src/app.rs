//! Application context: unified state passed to every command handler.
//!
//! Built once in `Cli::run()` after configuration and logging are set up.
//! Owns the invocation's resource scope; `Cli::run()` drains it whatever the
//! command's outcome.

use std::sync::Arc;

use anyhow::Result;

use crate::domain::config::OpsConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::scope::ResourceScope;
use crate::output::OutputContext;

/// Output rendering flags.
pub struct AppFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Effective configuration (file plus environment overrides).
    pub config: OpsConfig,
    pub config_store: YamlConfigStore,
    /// Process runner with the configured command timeout.
    pub runner: Arc<TokioCommandRunner>,
    /// Cleanup registry and temp arena for this invocation.
    pub scope: Arc<ResourceScope>,
}

impl AppContext {
    /// Construct an `AppContext` and its resource scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp arena cannot be created.
    pub fn new(flags: &AppFlags, config_store: YamlConfigStore, config: OpsConfig) -> Result<Self> {
        let runner = Arc::new(TokioCommandRunner::new(config.timeouts.command()));
        let scope = ResourceScope::new()?;
        tracing::debug!(arena = %scope.root().display(), "resource scope created");
        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            config,
            config_store,
            runner,
            scope,
        })
    }
}
