//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::application::ports::ConfigStore;
use crate::commands;
use crate::infra::config::YamlConfigStore;
use crate::infra::signals::shutdown_signal;
use crate::output::logging;

/// SSH sessions, tunnels, ordered steps and TAP tests for stack hosts
#[derive(Parser)]
#[command(
    name = "opskit",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (also any NO_COLOR value but 0, false, no or off)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Enable debug logging (also OPSKIT_DEBUG)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// SSH to a stack host by index
    Ssh(commands::ssh::SshArgs),

    /// Forward ports to a stack host while a local command runs
    Tunnel(commands::tunnel::TunnelArgs),

    /// Run a script with the invocation's environment
    Exec(commands::exec::ExecArgs),

    /// Run plan steps in order
    Steps(commands::steps::StepsArgs),

    /// Run plan tests and print a TAP report
    Test(commands::test::TestArgs),

    /// Install packages or refresh package lists
    #[command(subcommand)]
    Apt(commands::apt::AptCommand),

    /// Show configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

enum Outcome {
    Finished(Result<ExitCode>),
    Signalled(crate::infra::signals::Shutdown),
}

impl Cli {
    /// Execute the CLI command, then drain the invocation's resource scope.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, the scope cannot
    /// be created, or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            quiet,
            no_color,
            debug,
            command,
        } = self;
        if let Command::Version { json } = command {
            return commands::version::run(json);
        }

        let store = YamlConfigStore::from_env();
        let config = store.load()?;
        logging::init(debug || config.debug, no_color);
        let app = AppContext::new(&AppFlags { no_color, quiet }, store, config)?;

        let outcome = tokio::select! {
            result = dispatch(&app, command) => Outcome::Finished(result),
            Ok(signal) = shutdown_signal() => Outcome::Signalled(signal),
        };

        let report = app.scope.drain().await;
        for failure in &report.failures {
            app.output
                .warn(&format!("cleanup '{}' failed: {:#}", failure.label, failure.error));
        }
        tracing::debug!(actions = report.executed.len(), "resource scope drained");

        match outcome {
            Outcome::Finished(result) => result,
            Outcome::Signalled(signal) => {
                tracing::warn!(signal = signal.name(), "interrupted");
                Ok(ExitCode::from(signal.exit_code()))
            }
        }
    }
}

async fn dispatch(app: &AppContext, command: Command) -> Result<ExitCode> {
    match command {
        Command::Ssh(args) => commands::ssh::run(app, &args).await,
        Command::Tunnel(args) => commands::tunnel::run(app, &args).await,
        Command::Exec(args) => commands::exec::run(app, &args).await,
        Command::Steps(args) => commands::steps::run(app, &args).await,
        Command::Test(args) => commands::test::run(app, &args).await,
        Command::Apt(cmd) => commands::apt::run(app, cmd).await,
        Command::Config(cmd) => commands::config::run(app, &cmd),
        Command::Version { json } => commands::version::run(json),
    }
}
