//! Diagnostic logging on stderr via `tracing`.

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "warn" }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `debug`.
/// Calling it again is a no-op.
pub fn init(debug: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color && console::Term::stderr().is_term())
        .with_target(debug)
        .try_init();
}
