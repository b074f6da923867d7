//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries hold:
//! domain and application code never reach into infra, commands or output,
//! and nothing mutates the process environment.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

/// Every non-comment line in `dir` containing one of `needles`.
fn find_lines(dir: &Path, needles: &[&str]) -> Vec<String> {
    let mut hits = Vec::new();
    for file in collect_rs_files(dir) {
        let rel = relative(&file);
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            if needles.iter().any(|n| line.contains(n)) {
                hits.push(format!("{rel}:{}: {line}", i + 1));
            }
        }
    }
    hits
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

// ── Layer boundaries ──────────────────────────────────────────────────────────

#[test]
fn domain_has_no_outward_imports() {
    let violations = find_lines(
        &src_dir().join("domain"),
        &[
            "crate::infra",
            "crate::commands",
            "crate::output",
            "crate::application",
            "crate::app::",
            "tokio::",
            "std::process",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay pure:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_imports_from_infra_commands_or_output() {
    let violations = find_lines(
        &src_dir().join("application"),
        &["crate::infra", "crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must depend only on domain/ and its ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_lines(
        &src_dir().join("infra"),
        &["crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir().join("infra")) {
        let rel = relative(&file);
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };

        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || trimmed.starts_with("//") {
                continue;
            }
            if line.contains("println!") || line.contains("eprintln!") {
                violations.push(format!(
                    "{rel}:{}: print macro in infra/ outside #[cfg(test)]: {line}",
                    i + 1
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

// ── Process environment ───────────────────────────────────────────────────────

#[test]
fn process_environment_is_never_mutated() {
    let violations = find_lines(&src_dir(), &["set_var(", "remove_var("]);
    assert!(
        violations.is_empty(),
        "child environments travel as EnvPatch; found process env mutation:\n{}",
        violations.join("\n")
    );
}

// ── Runner construction ───────────────────────────────────────────────────────

#[test]
fn no_tokio_command_runner_new_outside_infra_and_app() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir()) {
        let rel = relative(&file);
        if rel.contains("/infra/") || rel.ends_with("app.rs") {
            continue;
        }
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            if line.contains("TokioCommandRunner::new") {
                violations.push(format!(
                    "{rel}:{}: TokioCommandRunner::new outside infra/: {line}",
                    i + 1
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found TokioCommandRunner::new outside infra/ and app.rs:\n{}",
        violations.join("\n")
    );
}

// ── Command handlers ──────────────────────────────────────────────────────────

#[test]
fn command_handlers_return_exit_codes() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir().join("commands")) {
        let rel = relative(&file);
        if rel.ends_with("mod.rs") {
            continue;
        }
        let lines = read_non_comment_lines(&file);
        let handler = lines
            .iter()
            .find(|l| l.contains("pub fn run(") || l.contains("pub async fn run("));
        match handler {
            Some(line) if line.contains("Result<ExitCode>") => {}
            Some(line) => violations.push(format!("{rel}: handler without ExitCode: {line}")),
            None => violations.push(format!("{rel}: no `run` handler")),
        }
    }

    assert!(
        violations.is_empty(),
        "command handlers must be `run(..) -> Result<ExitCode>`:\n{}",
        violations.join("\n")
    );
}
