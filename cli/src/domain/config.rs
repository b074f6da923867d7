//! Domain types and validators for opskit configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Toggles verbose diagnostic logging.
pub const ENV_DEBUG: &str = "OPSKIT_DEBUG";
/// Privilege escalation command override (empty disables).
pub const ENV_SUDO: &str = "OPSKIT_SUDO";
/// Package manager override.
pub const ENV_APT: &str = "OPSKIT_APT";
/// Config file location override.
pub const ENV_CONFIG: &str = "OPSKIT_CONFIG";

const TRUE_VALUES: &[&str] = &["1", "true", "yes", "on"];
const FALSE_VALUES: &[&str] = &["", "0", "false", "no", "off"];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.opskit/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    /// Verbose diagnostic logging.
    pub debug: bool,
    /// Privilege escalation command; empty runs commands directly.
    pub sudo: String,
    /// Package manager used by `opskit apt`.
    pub apt: String,
    pub ssh: SshSettings,
    pub stack: StackSettings,
    pub timeouts: Timeouts,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            debug: false,
            sudo: "sudo".to_string(),
            apt: "apt-get".to_string(),
            ssh: SshSettings::default(),
            stack: StackSettings::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Programs and options for SSH sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub program: String,
    pub agent_program: String,
    pub add_program: String,
    /// Remote login user unless the stack overrides it.
    pub user: String,
    /// Extra `Key Value` lines appended to the generated ssh config.
    pub options: Vec<String>,
    pub connect_timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            agent_program: "ssh-agent".to_string(),
            add_program: "ssh-add".to_string(),
            user: "ubuntu".to_string(),
            options: Vec::new(),
            connect_timeout_secs: 10,
        }
    }
}

/// Where hosts and credentials come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Command printing the stack outputs as a JSON object.
    pub command: Vec<String>,
    /// Output holding the host list.
    pub hosts_output: String,
    /// Output holding the SSH private key.
    pub key_output: String,
    /// Output overriding `ssh.user`, if present.
    pub user_output: String,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            command: ["pulumi", "stack", "output", "--json", "--show-secrets"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            hosts_output: "hosts".to_string(),
            key_output: "ssh_private_key".to_string(),
            user_output: "ssh_user".to_string(),
        }
    }
}

/// Timeouts, in seconds, for non-interactive blocking operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub agent_secs: u64,
    pub handshake_secs: u64,
    pub close_secs: u64,
    pub command_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            agent_secs: 10,
            handshake_secs: 30,
            close_secs: 30,
            command_secs: 120,
        }
    }
}

impl Timeouts {
    #[must_use]
    pub fn agent(&self) -> Duration {
        Duration::from_secs(self.agent_secs)
    }

    #[must_use]
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    #[must_use]
    pub fn close(&self) -> Duration {
        Duration::from_secs(self.close_secs)
    }

    #[must_use]
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }
}

impl OpsConfig {
    /// Applies `OPSKIT_*` environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPSKIT_DEBUG` is not a recognised boolean.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEBUG) {
            self.debug = parse_flag(ENV_DEBUG, &value)?;
        }
        if let Some(value) = lookup(ENV_SUDO) {
            self.sudo = value;
        }
        if let Some(value) = lookup(ENV_APT) {
            self.apt = value;
        }
        Ok(())
    }
}

/// Parses a boolean flag value as accepted in `OPSKIT_DEBUG`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for anything outside the accepted
/// true/false spellings.
pub fn parse_flag(key: &str, value: &str) -> Result<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    if TRUE_VALUES.contains(&normalized.as_str()) {
        return Ok(true);
    }
    if FALSE_VALUES.contains(&normalized.as_str()) {
        return Ok(false);
    }
    Err(ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: [TRUE_VALUES, &FALSE_VALUES[1..]].concat().join(", "),
    }
    .into())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
