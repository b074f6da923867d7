//! Integration tests for the opskit CLI surface: help, version, exec and
//! config.

#![allow(clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn opskit() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("opskit"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("OPSKIT_DEBUG");
    cmd.env_remove("OPSKIT_SUDO");
    cmd.env_remove("OPSKIT_APT");
    cmd
}

/// An `opskit` command whose config file and temp arena both live in `dir`.
fn opskit_in(dir: &TempDir) -> Command {
    let mut cmd = opskit();
    cmd.env("OPSKIT_CONFIG", dir.path().join("config.yaml"));
    cmd.env("TMPDIR", dir.path());
    cmd.current_dir(dir.path());
    cmd
}

fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    path
}

fn arena_leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("opskit."))
        .collect()
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help() {
    opskit()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_help_lists_subcommands() {
    let assert = opskit().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for sub in ["ssh", "tunnel", "exec", "steps", "test", "apt", "config", "version"] {
        assert!(stdout.contains(sub), "missing {sub} in help:\n{stdout}");
    }
}

#[test]
fn test_version_command_shows_version() {
    opskit()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "opskit {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let assert = opskit().args(["version", "--json"]).assert().success();
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_no_color_accepts_conventional_values() {
    for value in ["1", "true", "yes", "0"] {
        opskit()
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success();
    }
    opskit().env_remove("NO_COLOR").args(["--no-color", "version"]).assert().success();
}

#[test]
fn test_unknown_subcommand_fails() {
    opskit()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// --- exec ---

#[test]
fn test_exec_missing_script_fails() {
    let dir = TempDir::new().expect("tempdir");
    opskit_in(&dir)
        .args(["exec", "nope.sh"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Script not found: nope.sh"));
}

#[test]
fn test_exec_directory_is_not_a_file() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
    opskit_in(&dir)
        .args(["exec", "sub"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not a regular file: sub"));
}

#[test]
fn test_exec_passes_arguments_and_exit_code() {
    let dir = TempDir::new().expect("tempdir");
    write_script(
        dir.path(),
        "job.sh",
        "echo \"args: $*\"\nexit 7\n",
    );

    opskit_in(&dir)
        .args(["exec", "job.sh", "one", "--two"])
        .assert()
        .code(7)
        .stdout("args: one --two\n");
}

#[test]
fn test_exec_runs_executable_named_like_a_shell() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("tempdir");
    let script = write_script(dir.path(), "sh", "#!/bin/sh\necho \"own script: $*\"\n");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    opskit_in(&dir)
        .args(["exec", "sh", "arg"])
        .assert()
        .success()
        .stdout("own script: arg\n");
}

#[test]
fn test_exec_points_tmpdir_into_arena_and_removes_it() {
    let dir = TempDir::new().expect("tempdir");
    write_script(
        dir.path(),
        "tmp.sh",
        "echo \"$TMPDIR\"\ntest -d \"$TMPDIR\"\n",
    );

    let assert = opskit_in(&dir).args(["exec", "tmp.sh"]).assert().success();
    let tmpdir = String::from_utf8_lossy(&assert.get_output().stdout)
        .trim()
        .to_string();

    let arena = Path::new(&tmpdir);
    assert!(arena.starts_with(dir.path()), "{tmpdir}");
    assert!(
        arena
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with("opskit.")),
        "{tmpdir}"
    );
    assert!(!arena.exists(), "arena left behind: {tmpdir}");
    assert!(arena_leftovers(dir.path()).is_empty());
}

// --- config ---

#[test]
fn test_config_path_honours_override() {
    let dir = TempDir::new().expect("tempdir");
    let expected = dir.path().join("config.yaml");
    opskit_in(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(format!("{}\n", expected.display()))
        .stderr(predicate::str::contains("defaults are in use"));
}

#[test]
fn test_config_show_merges_file_and_environment() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("config.yaml"),
        "sudo: doas\nssh:\n  user: deploy\n",
    )
    .expect("write config");

    let assert = opskit_in(&dir)
        .env("OPSKIT_APT", "apt")
        .args(["config", "show"])
        .assert()
        .success();
    let shown: serde_yaml::Value =
        serde_yaml::from_slice(&assert.get_output().stdout).expect("yaml output");

    assert_eq!(shown["sudo"], "doas");
    assert_eq!(shown["apt"], "apt");
    assert_eq!(shown["ssh"]["user"], "deploy");
    assert_eq!(shown["stack"]["hosts_output"], "hosts");
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("config.yaml"), "ssh: [not, a, map]\n").expect("write");

    opskit_in(&dir)
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"));
}

// --- apt ---

#[test]
fn test_apt_install_runs_configured_package_manager() {
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join("apt.log");
    let fake = write_script(
        dir.path(),
        "fake-apt.sh",
        &format!(
            "echo \"$*\" > '{}'\n",
            log.display()
        ),
    );

    opskit_in(&dir)
        .env("OPSKIT_SUDO", format!("sh {}", fake.display()))
        .args(["apt", "install", "curl", "jq"])
        .assert()
        .success();

    let logged = std::fs::read_to_string(&log).expect("apt log");
    assert_eq!(
        logged,
        "env DEBIAN_FRONTEND=noninteractive apt-get install -y curl jq\n"
    );
}

#[test]
fn test_apt_install_requires_packages() {
    opskit().args(["apt", "install"]).assert().code(2);
}
