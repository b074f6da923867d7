//! `opskit apt`: package manager wrapper.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::infra::apt::AptWrapper;

/// Apt subcommands.
#[derive(Subcommand)]
pub enum AptCommand {
    /// Install packages
    Install {
        /// Packages to install
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Refresh package lists
    Update,
}

/// Run the apt command. The exit code is the package manager's.
///
/// # Errors
///
/// Returns an error if the package manager cannot be started.
pub async fn run(app: &AppContext, cmd: AptCommand) -> Result<ExitCode> {
    let apt = AptWrapper::new(app.runner.as_ref(), &app.config);
    let env = app.scope.env();
    let status = match cmd {
        AptCommand::Install { packages } => apt.install(&packages, &env).await?,
        AptCommand::Update => apt.update(&env).await?,
    };
    Ok(super::exit_code(status))
}
