//! Filesystem helpers for private files and directories.

use std::path::Path;

use anyhow::{Context, Result};

/// Mode for directories holding credentials.
pub const PRIVATE_DIR_MODE: u32 = 0o700;
/// Mode for files holding credentials.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Writes `content` to `path` and restricts the file to the owner.
///
/// # Errors
///
/// Returns an error if the file cannot be written or its permissions cannot
/// be set.
pub fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))?;
    set_permissions(path, PRIVATE_FILE_MODE)
}

/// Removes a directory tree; a missing directory is not an error.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("removing directory {}", path.display()))
        }
        _ => Ok(()),
    }
}

/// Sets unix permission bits on `path`. No-op on other platforms.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
pub fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
