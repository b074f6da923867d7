//! Generated ssh client config, written into the scope's arena.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::config::SshSettings;
use crate::domain::ssh::render_config;
use crate::infra::fs::PRIVATE_FILE_MODE;
use crate::infra::scope::{ResourceScope, TempOptions};

/// Writes the config for `user` into a private file in the arena.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the file cannot be written.
pub fn write_config(scope: &ResourceScope, settings: &SshSettings, user: &str) -> Result<PathBuf> {
    let content = render_config(user, settings.connect_timeout_secs, &settings.options)?;
    let path = scope.temp_file(
        &TempOptions::prefix("ssh_config.").with_mode(PRIVATE_FILE_MODE),
    )?;
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), user, "ssh config written");
    Ok(path)
}

/// Arguments pointing `ssh` at `config`.
#[must_use]
pub fn config_args(config: &Path) -> Vec<String> {
    vec!["-F".to_string(), config.to_string_lossy().into_owned()]
}
