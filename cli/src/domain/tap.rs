//! TAP (Test Anything Protocol) line formatting.
//!
//! Pure functions only. The harness writes these lines in order: version,
//! plan, then one result line per test followed by its diagnostics.

/// Version declaration emitted first.
pub const TAP_VERSION: &str = "TAP version 13";

/// Plan line declaring the number of tests.
#[must_use]
pub fn plan_line(total: usize) -> String {
    format!("1..{total}")
}

/// Result line for the test at 1-based position `number`.
#[must_use]
pub fn result_line(number: usize, passed: bool, description: &str) -> String {
    let status = if passed { "ok" } else { "not ok" };
    if description.is_empty() {
        format!("{status} {number}")
    } else {
        format!("{status} {number} - {}", escape_description(description))
    }
}

/// Diagnostic lines for captured test output, one `# `-prefixed line per
/// output line. Empty output yields no lines.
#[must_use]
pub fn diagnostic_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| {
            if line.is_empty() {
                "#".to_string()
            } else {
                format!("# {line}")
            }
        })
        .collect()
}

// `#` starts a directive in a result line.
fn escape_description(description: &str) -> String {
    description.replace('\\', "\\\\").replace('#', "\\#").replace('\n', " ")
}
