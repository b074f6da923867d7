//! `opskit ssh`: SSH to a stack host by index.
//!
//! Looks the host and key up in the stack outputs, loads the key into a
//! fresh agent session, and runs `ssh` against a generated config. The
//! scope tears the agent down afterwards.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::{CommandRunner, StackProvider};
use crate::domain::env::EnvPatch;
use crate::domain::stack::{optional_string_output, select_host, string_output};
use crate::infra::agent::{AgentSession, AgentSettings};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::ssh_config::{config_args, write_config};
use crate::infra::stack::CommandStackProvider;

/// Arguments for the ssh command.
#[derive(Args)]
#[command(trailing_var_arg = true)]
pub struct SshArgs {
    /// Index of the host in the stack's host list
    pub index: usize,

    /// Command to run on the host; interactive login if absent
    #[arg(allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Everything needed to reach one stack host.
pub struct Connection {
    pub host: String,
    pub user: String,
    pub config: PathBuf,
    pub agent: AgentSession<TokioCommandRunner>,
    /// Scope environment plus the agent patch.
    pub env: EnvPatch,
}

impl Connection {
    /// `-F <config>` followed by `extra`, then the host.
    #[must_use]
    pub fn ssh_args(&self, extra: &[String]) -> Vec<String> {
        let mut args = config_args(&self.config);
        args.extend(extra.iter().cloned());
        args.push(self.host.clone());
        args
    }
}

/// Resolves host `index` and prepares an agent holding the stack key.
///
/// # Errors
///
/// Returns an error if the stack outputs cannot be read, the host or key
/// is missing, or the agent cannot be started or refuses the key.
pub async fn connect(app: &AppContext, index: usize) -> Result<Connection> {
    let stack = &app.config.stack;
    let provider = CommandStackProvider::new(
        app.runner.as_ref(),
        stack.command.clone(),
        app.scope.env(),
        app.config.timeouts.command(),
    );
    let outputs = provider.outputs().await?;
    let host = select_host(&outputs, &stack.hosts_output, index)?;
    let key = string_output(&outputs, &stack.key_output)?;
    let user = optional_string_output(&outputs, &stack.user_output)?
        .unwrap_or(app.config.ssh.user.as_str())
        .to_string();
    tracing::info!(index, host = %host, user = %user, "host resolved");

    let config = write_config(&app.scope, &app.config.ssh, &user)?;
    let agent = AgentSession::begin(
        &app.scope,
        Arc::clone(&app.runner),
        AgentSettings::from_config(&app.config),
    )
    .await?;
    agent
        .add_key_material(&stack.key_output, key.as_bytes())
        .await
        .context("cannot load the stack's SSH key")?;
    let env = app.scope.env().merged(&agent.env());

    Ok(Connection {
        host,
        user,
        config,
        agent,
        env,
    })
}

/// Run the ssh command. The exit code is the remote command's.
///
/// # Errors
///
/// Returns an error if the connection cannot be prepared or `ssh` cannot be
/// started.
pub async fn run(app: &AppContext, args: &SshArgs) -> Result<ExitCode> {
    let connection = connect(app, args.index).await?;
    let mut ssh_args = connection.ssh_args(&[]);
    ssh_args.extend(args.command.iter().cloned());
    let ssh_args: Vec<&str> = ssh_args.iter().map(String::as_str).collect();

    let status = app
        .runner
        .run_status(&app.config.ssh.program, &ssh_args, &connection.env)
        .await
        .context("failed to run ssh")?;
    tracing::debug!(%status, "ssh finished");
    Ok(super::exit_code(status))
}
