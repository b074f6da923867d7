//! Unit tests for the step runner service.
//!
//! Plan steps run through a `ScriptedRunner`, so no shell is spawned.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use opskit::application::services::step_runner::{FailurePolicy, StepRegistry};
use opskit::domain::env::EnvPatch;
use opskit::domain::plan::Plan;

use crate::helpers::{CollectingReporter, ScriptedRunner};

const PLAN: &str = "\
steps:
  setup::c: echo step-c
  setup::a: echo step-a
  setup::b: echo step-b
  deploy::a: echo deploy-a
";

fn registry(runner: &Arc<ScriptedRunner>) -> StepRegistry {
    let plan = Plan::from_yaml(PLAN).expect("valid plan");
    let mut registry = StepRegistry::new();
    registry
        .register_plan(&plan, runner, &EnvPatch::new().with("STAGE", "unit"))
        .expect("register plan");
    registry
}

#[tokio::test]
async fn test_run_executes_prefix_steps_in_name_order() {
    let runner = Arc::new(ScriptedRunner::new());
    let reporter = CollectingReporter::default();

    let report = registry(&runner)
        .run("setup", None, FailurePolicy::FailFast, &reporter)
        .await
        .expect("run");

    assert!(report.is_success());
    assert_eq!(report.executed(), ["setup::a", "setup::b", "setup::c"]);
    assert_eq!(runner.scripts(), ["echo step-a", "echo step-b", "echo step-c"]);
    assert_eq!(
        reporter.events(),
        ["step: setup::a", "step: setup::b", "step: setup::c"]
    );
}

#[tokio::test]
async fn test_run_passes_env_patch_to_every_snippet() {
    let runner = Arc::new(ScriptedRunner::new());
    registry(&runner)
        .run("deploy", None, FailurePolicy::FailFast, &CollectingReporter::default())
        .await
        .expect("run");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "sh");
    assert_eq!(calls[0].args[0], "-c");
    assert_eq!(calls[0].env, EnvPatch::new().with("STAGE", "unit"));
}

#[tokio::test]
async fn test_run_from_start_skips_earlier_steps_and_warns() {
    let runner = Arc::new(ScriptedRunner::new());
    let reporter = CollectingReporter::default();

    let report = registry(&runner)
        .run("setup", Some("b"), FailurePolicy::FailFast, &reporter)
        .await
        .expect("run");

    assert_eq!(report.executed(), ["setup::b", "setup::c"]);
    assert_eq!(reporter.events()[0], "warn: starting at setup::b");
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let runner = Arc::new(ScriptedRunner::new().respond("step-b", 2, ""));

    let report = registry(&runner)
        .run("setup", None, FailurePolicy::FailFast, &CollectingReporter::default())
        .await
        .expect("run");

    assert!(!report.is_success());
    assert_eq!(report.executed(), ["setup::a", "setup::b"]);
    let err = report.into_result().expect_err("failure surfaces");
    assert!(format!("{err:#}").contains("Step 'setup::b' failed"), "{err:#}");
}

#[tokio::test]
async fn test_continue_policy_runs_remaining_steps() {
    let runner = Arc::new(ScriptedRunner::new().respond("step-a", 1, ""));

    let report = registry(&runner)
        .run("setup", None, FailurePolicy::Continue, &CollectingReporter::default())
        .await
        .expect("run");

    assert_eq!(report.executed(), ["setup::a", "setup::b", "setup::c"]);
    let failed: Vec<_> = report.failures().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, ["setup::a"]);
}

#[tokio::test]
async fn test_spawn_error_is_a_step_failure() {
    let runner = Arc::new(ScriptedRunner::new().fail_to_spawn("step-a"));

    let report = registry(&runner)
        .run("setup", None, FailurePolicy::FailFast, &CollectingReporter::default())
        .await
        .expect("run");

    assert_eq!(report.executed(), ["setup::a"]);
    let message = format!("{:#}", report.results[0].error.as_ref().expect("error"));
    assert!(message.contains("cannot run step"), "{message}");
}

#[tokio::test]
async fn test_unknown_prefix_runs_nothing() {
    let runner = Arc::new(ScriptedRunner::new());
    let report = registry(&runner)
        .run("missing", None, FailurePolicy::FailFast, &CollectingReporter::default())
        .await
        .expect("run");

    assert!(report.results.is_empty());
    assert!(report.is_success());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_start_is_rejected_before_running() {
    let runner = Arc::new(ScriptedRunner::new());
    let result = registry(&runner)
        .run("setup", Some("b c"), FailurePolicy::FailFast, &CollectingReporter::default())
        .await;

    assert!(result.is_err());
    assert!(runner.calls().is_empty());
}

#[test]
fn test_selection_lists_without_running() {
    let runner = Arc::new(ScriptedRunner::new());
    let registry = registry(&runner);

    assert_eq!(registry.selection("setup", Some("c")), ["setup::c"]);
    assert_eq!(registry.len(), 4);
    assert!(runner.calls().is_empty());
}
