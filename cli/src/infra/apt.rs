//! Package manager wrapper honouring the sudo and apt overrides.

use std::process::ExitStatus;

use anyhow::Result;

use crate::application::ports::CommandRunner;
use crate::domain::config::OpsConfig;
use crate::domain::env::EnvPatch;

/// Frontend variable keeping apt from prompting.
pub const FRONTEND_VAR: &str = "DEBIAN_FRONTEND";

/// Runs `[sudo env DEBIAN_FRONTEND=noninteractive] <apt> <verb> -y <packages>`
/// with inherited stdio.
pub struct AptWrapper<'a, R> {
    runner: &'a R,
    sudo: String,
    apt: String,
}

impl<'a, R: CommandRunner> AptWrapper<'a, R> {
    #[must_use]
    pub fn new(runner: &'a R, config: &OpsConfig) -> Self {
        Self {
            runner,
            sudo: config.sudo.clone(),
            apt: config.apt.clone(),
        }
    }

    /// The program and arguments for `verb`. Both the sudo and apt settings
    /// are split on whitespace. Under sudo the frontend is passed through
    /// `env`, since sudo resets the child environment.
    #[must_use]
    pub fn command(&self, verb: &str, packages: &[String]) -> (String, Vec<String>) {
        let mut argv: Vec<String> = self.sudo.split_whitespace().map(str::to_string).collect();
        if !argv.is_empty() {
            argv.push("env".to_string());
            argv.push(format!("{FRONTEND_VAR}=noninteractive"));
        }
        argv.extend(self.apt.split_whitespace().map(str::to_string));
        argv.push(verb.to_string());
        argv.push("-y".to_string());
        argv.extend(packages.iter().cloned());
        let program = argv.remove(0);
        (program, argv)
    }

    /// # Errors
    ///
    /// Returns an error if the package manager cannot be started.
    pub async fn install(&self, packages: &[String], env: &EnvPatch) -> Result<ExitStatus> {
        self.run("install", packages, env).await
    }

    /// # Errors
    ///
    /// Returns an error if the package manager cannot be started.
    pub async fn update(&self, env: &EnvPatch) -> Result<ExitStatus> {
        self.run("update", &[], env).await
    }

    async fn run(&self, verb: &str, packages: &[String], env: &EnvPatch) -> Result<ExitStatus> {
        let (program, args) = self.command(verb, packages);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env = env.merged(&EnvPatch::new().with(FRONTEND_VAR, "noninteractive"));
        tracing::info!(program = %program, ?args, "running package manager");
        self.runner.run_status(&program, &args, &env).await
    }
}
