//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Agent errors ──────────────────────────────────────────────────────────────

/// Errors related to the credential agent session.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("An ssh-agent session is already active in this scope. End it before starting another.")]
    AlreadyActive,

    #[error("No ssh-agent session is active.")]
    NotActive,

    #[error("ssh-agent failed to start: {0}")]
    LaunchFailed(String),

    #[error("ssh-agent did not report {0}")]
    MissingVariable(&'static str),

    #[error("ssh-agent reported an invalid pid: {0:?}")]
    InvalidPid(String),

    #[error("ssh-add rejected key from {source_label} (exit status {status})")]
    KeyRejected { source_label: String, status: String },
}

// ── Tunnel errors ─────────────────────────────────────────────────────────────

/// Errors raised by the background forwarding session.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to port forward: expected {expected:?}, got {got:?}")]
    HandshakeMismatch { expected: String, got: String },

    #[error("failed to port forward: connection closed before the readiness line")]
    HandshakeEof,

    #[error("failed to port forward: no readiness line after {0}s")]
    HandshakeTimeout(u64),
}

// ── Step errors ───────────────────────────────────────────────────────────────

/// Errors related to step registration and execution.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Invalid step name '{0}': must match ^[A-Za-z0-9_.-]+$")]
    InvalidName(String),

    #[error("Step '{0}' failed")]
    Failed(String),
}

// ── Stack errors ──────────────────────────────────────────────────────────────

/// Errors raised while reading hosts and keys from stack outputs.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("Stack output '{0}' not found")]
    MissingOutput(String),

    #[error("Stack output '{0}' is not a list")]
    NotAList(String),

    #[error("Stack output '{0}' is not a string")]
    NotAString(String),

    #[error("Host index {index} out of range: stack has {count} host(s)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Host entry {0} has no address")]
    NoAddress(usize),

    #[error("Stack outputs are not a JSON object")]
    NotAnObject,
}

// ── Script errors ─────────────────────────────────────────────────────────────

/// Errors raised by the script bootstrapper.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
