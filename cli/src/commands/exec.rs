//! `opskit exec`: run a script with the invocation's environment.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::CommandRunner;
use crate::domain::error::ScriptError;

/// Arguments for the exec command.
#[derive(Args)]
#[command(trailing_var_arg = true)]
pub struct ExecArgs {
    /// Script file to run
    pub script: PathBuf,

    /// Arguments passed to the script
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Checks that `script` names an existing regular file.
///
/// # Errors
///
/// Returns `ScriptError::Missing` or `ScriptError::NotAFile`.
pub fn check_script(script: &Path) -> Result<(), ScriptError> {
    match std::fs::metadata(script) {
        Err(_) => Err(ScriptError::Missing(script.to_path_buf())),
        Ok(meta) if !meta.is_file() => Err(ScriptError::NotAFile(script.to_path_buf())),
        Ok(_) => Ok(()),
    }
}

/// The program and arguments to run `script`. Files without an execute
/// bit are handed to `sh`.
#[must_use]
pub fn script_command(script: &Path, args: &[String]) -> (String, Vec<String>) {
    if is_executable(script) {
        (direct_path(script), args.to_vec())
    } else {
        let mut argv = vec![script.to_string_lossy().into_owned()];
        argv.extend(args.iter().cloned());
        ("sh".to_string(), argv)
    }
}

/// `script` spelled so that it is never looked up on `PATH`.
fn direct_path(script: &Path) -> String {
    let path = script.to_string_lossy();
    if path.contains('/') {
        path.into_owned()
    } else {
        format!("./{path}")
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Run the exec command. The exit code is the script's.
///
/// # Errors
///
/// Returns an error if the script is missing or cannot be started.
pub async fn run(app: &AppContext, args: &ExecArgs) -> Result<ExitCode> {
    check_script(&args.script)?;
    let (program, argv) = script_command(&args.script, &args.args);
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();

    tracing::info!(script = %args.script.display(), "running script");
    let status = app
        .runner
        .run_status(&program, &argv, &app.scope.env())
        .await
        .with_context(|| format!("failed to run {}", args.script.display()))?;
    Ok(super::exit_code(status))
}
