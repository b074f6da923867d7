//! Command implementations

pub mod apt;
pub mod config;
pub mod exec;
pub mod ssh;
pub mod steps;
pub mod tunnel;
pub mod version;

use std::path::Path;
use std::process::{ExitCode, ExitStatus};

use anyhow::{Context, Result};

use crate::domain::plan::Plan;

/// Reads and validates a plan file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid plan.
pub fn load_plan(path: &Path) -> Result<Plan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read plan {}", path.display()))?;
    Plan::from_yaml(&text).with_context(|| format!("invalid plan {}", path.display()))
}

/// Maps a child's exit status onto ours.
#[must_use]
pub fn exit_code(status: ExitStatus) -> ExitCode {
    ExitCode::from(exit_value(status))
}

/// Numeric exit value for `status`. Death by signal becomes `128 + signal`,
/// as a shell reports it.
#[must_use]
pub fn exit_value(status: ExitStatus) -> u8 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return u8::try_from(128 + signal).unwrap_or(1);
        }
    }
    status.code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1)
}
