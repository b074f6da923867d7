//! Process termination signals.

use anyhow::Result;

/// Termination signal received while a command was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Interrupt,
    Terminate,
}

impl Shutdown {
    /// Conventional shell exit code: 128 + signal number.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Interrupt => 130,
            Self::Terminate => 143,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }
}

/// Resolves when SIGINT or SIGTERM arrives.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> Result<Shutdown> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok(Shutdown::Interrupt)
        }
        _ = terminate.recv() => Ok(Shutdown::Terminate),
    }
}

/// Resolves when Ctrl-C arrives.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> Result<Shutdown> {
    tokio::signal::ctrl_c().await?;
    Ok(Shutdown::Interrupt)
}
