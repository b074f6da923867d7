//! Integration tests for `opskit steps` and `opskit test` against plan files.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const STEPS_PLAN: &str = "\
steps:
  setup::c: echo c
  setup::a: echo a
  setup::b: echo b
  other::a: echo other
";

const TESTS_PLAN: &str = "\
tests:
  - run: 'true'
    description: always passes
  - run: |
      echo first
      echo second >&2
      exit 1
    description: noisy failure
  - run: echo quiet
";

fn opskit(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("opskit"));
    cmd.env("NO_COLOR", "1");
    cmd.env("OPSKIT_CONFIG", dir.path().join("config.yaml"));
    cmd.env("TMPDIR", dir.path());
    cmd.current_dir(dir.path());
    cmd
}

fn plan(dir: &TempDir, name: &str, content: &str) -> String {
    std::fs::write(dir.path().join(name), content).expect("write plan");
    name.to_string()
}

// --- steps ---

#[test]
fn test_steps_run_in_name_order() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(&dir, "plan.yaml", STEPS_PLAN);

    opskit(&dir)
        .args(["steps", &file, "setup"])
        .assert()
        .success()
        .stdout("a\nb\nc\n")
        .stderr(predicate::str::contains("3 step(s) completed"));
}

#[test]
fn test_steps_resume_from_named_step() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(&dir, "plan.yaml", STEPS_PLAN);

    opskit(&dir)
        .args(["steps", &file, "setup", "--from", "b"])
        .assert()
        .success()
        .stdout("b\nc\n")
        .stderr(predicate::str::contains("starting at setup::b"));
}

#[test]
fn test_steps_stop_at_first_failure() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(
        &dir,
        "plan.yaml",
        "steps:\n  s::a: echo a\n  s::b: exit 4\n  s::c: echo c\n",
    );

    opskit(&dir)
        .args(["steps", &file, "s"])
        .assert()
        .code(1)
        .stdout("a\n")
        .stderr(predicate::str::contains("s::b"));
}

#[test]
fn test_steps_keep_going_runs_the_rest() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(
        &dir,
        "plan.yaml",
        "steps:\n  s::a: exit 4\n  s::b: echo b\n",
    );

    opskit(&dir)
        .args(["steps", &file, "s", "--keep-going"])
        .assert()
        .code(1)
        .stdout("b\n");
}

#[test]
fn test_steps_list_prints_selection_without_running() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(&dir, "plan.yaml", STEPS_PLAN);

    opskit(&dir)
        .args(["steps", &file, "setup", "--from", "b", "--list"])
        .assert()
        .success()
        .stdout("setup::b\nsetup::c\n");
}

#[test]
fn test_steps_invalid_name_in_plan_fails() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(&dir, "plan.yaml", "steps:\n  'bad name': 'true'\n");

    opskit(&dir)
        .args(["steps", &file, "setup"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid plan"));
}

#[test]
fn test_steps_missing_plan_fails() {
    let dir = TempDir::new().expect("tempdir");
    opskit(&dir)
        .args(["steps", "missing.yaml", "setup"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read plan"));
}

// --- test ---

#[test]
fn test_tap_report_and_exit_code() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(&dir, "tests.yaml", TESTS_PLAN);

    opskit(&dir)
        .args(["test", &file])
        .assert()
        .code(1)
        .stdout(
            "TAP version 13\n\
             1..3\n\
             ok 1 - always passes\n\
             not ok 2 - noisy failure\n\
             # first\n\
             # second\n\
             ok 3\n\
             # quiet\n",
        )
        .stderr(predicate::str::contains("1 of 3 test(s) failed"));
}

#[test]
fn test_all_passing_tests_exit_zero() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(&dir, "tests.yaml", "tests:\n  - run: 'true'\n");

    opskit(&dir)
        .args(["test", &file])
        .assert()
        .success()
        .stdout("TAP version 13\n1..1\nok 1\n");
}

#[test]
fn test_tests_see_the_arena_tmpdir() {
    let dir = TempDir::new().expect("tempdir");
    let file = plan(
        &dir,
        "tests.yaml",
        "tests:\n  - run: |\n      test -d \"$TMPDIR\"\n      case \"$TMPDIR\" in */opskit.*) ;; *) exit 1;; esac\n",
    );

    opskit(&dir).args(["test", &file]).assert().success();
}
