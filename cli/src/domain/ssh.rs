//! SSH client configuration and argument validation.

use anyhow::Result;

/// Seconds between keepalive probes on long-lived sessions.
pub const SERVER_ALIVE_INTERVAL: u64 = 30;

/// Renders the `Host *` block used for every connection to stack hosts.
///
/// Stack hosts are ephemeral, so host keys are neither checked nor recorded.
///
/// # Errors
///
/// Returns an error if an extra option is not a single `Key Value` line.
pub fn render_config(user: &str, connect_timeout_secs: u64, options: &[String]) -> Result<String> {
    validate_user(user)?;
    let mut lines = vec![
        "Host *".to_string(),
        format!("    User {user}"),
        "    StrictHostKeyChecking no".to_string(),
        "    UserKnownHostsFile /dev/null".to_string(),
        "    LogLevel ERROR".to_string(),
        format!("    ConnectTimeout {connect_timeout_secs}"),
        format!("    ServerAliveInterval {SERVER_ALIVE_INTERVAL}"),
        "    ExitOnForwardFailure yes".to_string(),
    ];
    for option in options {
        validate_option(option)?;
        lines.push(format!("    {}", option.trim()));
    }
    let mut config = lines.join("\n");
    config.push('\n');
    Ok(config)
}

/// Checks an extra ssh option has the form `Key Value` on one line.
///
/// # Errors
///
/// Returns an error naming the offending option.
pub fn validate_option(option: &str) -> Result<()> {
    anyhow::ensure!(
        !option.contains(['\n', '\r']),
        "ssh option must be a single line (got: {option:?})"
    );
    let mut parts = option.split_whitespace();
    let key = parts.next().unwrap_or_default();
    anyhow::ensure!(
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric()),
        "ssh option must start with a keyword (got: {option:?})"
    );
    anyhow::ensure!(
        parts.next().is_some(),
        "ssh option '{key}' has no value"
    );
    Ok(())
}

/// Validates a remote login user name.
///
/// # Errors
///
/// Returns an error if the name is empty or contains whitespace or `@`.
pub fn validate_user(user: &str) -> Result<()> {
    anyhow::ensure!(!user.is_empty(), "ssh user must not be empty");
    anyhow::ensure!(
        !user.chars().any(|c| c.is_whitespace() || c == '@'),
        "invalid ssh user {user:?}"
    );
    Ok(())
}

/// Validates a local forward in `ssh -L` form:
/// `[bind_address:]port:host:hostport`. IPv6 addresses are written in
/// brackets, as in `[::1]:8080:[2001:db8::1]:80`.
///
/// # Errors
///
/// Returns an error if the spec has the wrong shape or a port is invalid.
pub fn validate_forward(spec: &str) -> Result<()> {
    let shape = || format!("invalid forward {spec:?}: expected [bind_address:]port:host:hostport");
    let parts = forward_fields(spec).ok_or_else(|| anyhow::anyhow!(shape()))?;
    let (port, host, host_port) = match parts.as_slice() {
        [port, host, host_port] | [_, port, host, host_port] => (*port, *host, *host_port),
        _ => anyhow::bail!(shape()),
    };
    let bare_host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
    anyhow::ensure!(!bare_host.is_empty(), "invalid forward {spec:?}: empty host");
    for value in [port, host_port] {
        let valid = value.parse::<u16>().is_ok_and(|p| p != 0);
        anyhow::ensure!(valid, "invalid forward {spec:?}: bad port {value:?}");
    }
    Ok(())
}

/// Splits on `:` outside brackets. `None` if brackets are unbalanced or
/// nested.
fn forward_fields(spec: &str) -> Option<Vec<&str>> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_brackets = false;
    for (i, c) in spec.char_indices() {
        match c {
            '[' if !in_brackets => in_brackets = true,
            ']' if in_brackets => in_brackets = false,
            '[' | ']' => return None,
            ':' if !in_brackets => {
                fields.push(&spec[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_brackets {
        return None;
    }
    fields.push(&spec[start..]);
    Some(fields)
}
