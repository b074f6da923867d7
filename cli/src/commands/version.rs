//! Version command

use std::process::ExitCode;

use anyhow::{Context, Result};

/// Run the version command.
///
/// # Errors
///
/// Returns an error if the JSON output cannot be serialized.
pub fn run(json: bool) -> Result<ExitCode> {
    let version = env!("CARGO_PKG_VERSION");

    if json {
        let out = serde_json::to_string(&serde_json::json!({ "version": version }))
            .context("JSON serialization failed")?;
        println!("{out}");
    } else {
        println!("opskit {version}");
    }
    Ok(ExitCode::SUCCESS)
}
