//! `opskit tunnel`: forward ports to a stack host while a local command runs.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::CommandRunner;
use crate::domain::ssh::validate_forward;
use crate::infra::tunnel::{BackgroundSession, TunnelTimeouts};
use crate::output::progress;

/// Arguments for the tunnel command.
#[derive(Args)]
pub struct TunnelArgs {
    /// Index of the host in the stack's host list
    pub index: usize,

    /// Local forward, as for `ssh -L`: [bind_address:]port:host:hostport
    #[arg(short = 'L', long = "forward", value_name = "SPEC", required = true)]
    pub forwards: Vec<String>,

    /// Local command to run while the tunnel is up; waits for Ctrl-C if absent
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl TunnelArgs {
    /// `-T` plus one `-L <spec>` pair per forward.
    #[must_use]
    pub fn forward_args(&self) -> Vec<String> {
        let mut args = vec!["-T".to_string()];
        for spec in &self.forwards {
            args.push("-L".to_string());
            args.push(spec.clone());
        }
        args
    }
}

/// Run the tunnel command. The exit code is the local command's.
///
/// # Errors
///
/// Returns an error if a forward spec is invalid, the connection cannot be
/// prepared, the tunnel does not come up, or the local command cannot start.
pub async fn run(app: &AppContext, args: &TunnelArgs) -> Result<ExitCode> {
    for spec in &args.forwards {
        validate_forward(spec)?;
    }
    let connection = super::ssh::connect(app, args.index).await?;
    let ssh_args = connection.ssh_args(&args.forward_args());

    let pb = progress::spinner_if(
        app.output.show_progress(),
        &format!("Opening tunnel to {}...", connection.host),
    );
    let session = match BackgroundSession::run(
        &app.scope,
        app.runner.as_ref(),
        &app.config.ssh.program,
        &ssh_args,
        &connection.env,
        TunnelTimeouts::from_config(&app.config),
    )
    .await
    {
        Ok(session) => {
            progress::finish_ok(&pb, &format!("Tunnel to {} up", connection.host));
            session
        }
        Err(e) => {
            progress::finish_error(&pb, "Tunnel failed");
            return Err(e);
        }
    };

    let Some((program, rest)) = args.command.split_first() else {
        app.output.info("Press Ctrl-C to close the tunnel");
        return std::future::pending().await;
    };

    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    let status = app
        .runner
        .run_status(program, &rest, &app.scope.env())
        .await
        .with_context(|| format!("failed to run {program}"));

    if let Err(e) = session.close().await {
        app.output.warn(&format!("tunnel did not close cleanly: {e:#}"));
    }
    Ok(super::exit_code(status?))
}
