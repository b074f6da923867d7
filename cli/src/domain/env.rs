//! Environment patches applied to spawned child processes.
//!
//! The process-wide environment is never mutated. Anything that needs to
//! reach a child (the scope's temp root, the agent socket) travels as an
//! `EnvPatch` handed to the command runner.

use std::collections::BTreeMap;

use crate::domain::error::AgentError;

/// Variable that points children at the scope's temp arena.
pub const TEMP_ROOT_VAR: &str = "TMPDIR";
/// Agent socket variable exported by `ssh-agent`.
pub const AUTH_SOCK_VAR: &str = "SSH_AUTH_SOCK";
/// Agent pid variable exported by `ssh-agent`.
pub const AGENT_PID_VAR: &str = "SSH_AGENT_PID";

/// An ordered set of environment variable assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPatch {
    vars: BTreeMap<String, String>,
}

impl EnvPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a new patch with `other` layered on top of `self`.
    #[must_use]
    pub fn merged(&self, other: &EnvPatch) -> EnvPatch {
        let mut vars = self.vars.clone();
        vars.extend(other.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        EnvPatch { vars }
    }
}

/// Parses the startup output of `ssh-agent -s` (or `-c`) into a patch.
///
/// Accepts Bourne style (`NAME=value; export NAME;`) and csh style
/// (`setenv NAME value;`) lines. The patch must contain both the socket path
/// and a numeric agent pid.
///
/// # Errors
///
/// Returns `AgentError::MissingVariable` if either variable is absent, or
/// `AgentError::InvalidPid` if the pid is not numeric.
pub fn parse_agent_output(text: &str) -> Result<EnvPatch, AgentError> {
    let patch = scan_agent_output(text);
    if patch.get(AUTH_SOCK_VAR).is_none_or(str::is_empty) {
        return Err(AgentError::MissingVariable(AUTH_SOCK_VAR));
    }
    let pid = patch
        .get(AGENT_PID_VAR)
        .ok_or(AgentError::MissingVariable(AGENT_PID_VAR))?;
    if pid.parse::<u32>().is_err() {
        return Err(AgentError::InvalidPid(pid.to_string()));
    }
    Ok(patch)
}

/// Collects every variable assignment in agent startup output, without
/// checking that the socket and pid are present.
#[must_use]
pub fn scan_agent_output(text: &str) -> EnvPatch {
    let mut patch = EnvPatch::new();
    for statement in text.split([';', '\n']) {
        let statement = statement.trim();
        if let Some(rest) = statement.strip_prefix("setenv ") {
            if let Some((name, value)) = rest.trim().split_once(char::is_whitespace) {
                patch.set(name, value.trim());
            }
        } else if let Some((name, value)) = statement.split_once('=')
            && is_variable_name(name)
        {
            patch.set(name, value);
        }
    }
    patch
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
