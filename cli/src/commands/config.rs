//! `opskit config`: show the effective configuration.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration, environment overrides applied
    Show,
    /// Print the configuration file location
    Path,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized or its path
/// cannot be determined.
pub fn run(app: &AppContext, cmd: &ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => {
            let yaml = serde_yaml::to_string(&app.config).context("cannot serialize config")?;
            print!("{yaml}");
        }
        ConfigCommand::Path => {
            let path = app.config_store.path()?;
            println!("{}", path.display());
            if !path.exists() {
                app.output.info("File does not exist; defaults are in use");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
