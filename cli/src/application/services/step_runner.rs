//! Application service: ordered step runner.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Steps are registered explicitly under `<prefix>::<name>` and run in
//! byte-wise lexical order of their full names.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ProgressReporter};
use crate::domain::env::EnvPatch;
use crate::domain::error::StepError;
use crate::domain::plan::Plan;
use crate::domain::steps::{full_name, select_steps, validate_step_part};

/// Boxed future returned by a step.
pub type StepFuture = Pin<Box<dyn Future<Output = Result<()>>>>;

type StepFn = Box<dyn Fn() -> StepFuture>;

/// What to do after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing step.
    #[default]
    FailFast,
    /// Run every selected step and report all failures.
    Continue,
}

/// Result of one executed step.
#[derive(Debug)]
pub struct StepResult {
    pub name: String,
    pub error: Option<anyhow::Error>,
}

/// Results of a runner invocation, in execution order.
#[derive(Debug, Default)]
pub struct StepReport {
    pub results: Vec<StepResult>,
}

impl StepReport {
    /// Full names of the steps that ran, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Converts the report into an error carrying the first failure.
    ///
    /// # Errors
    ///
    /// Returns `StepError::Failed` wrapping the first failing step's cause.
    pub fn into_result(self) -> Result<()> {
        match self.results.into_iter().find(|r| r.error.is_some()) {
            Some(StepResult {
                name,
                error: Some(cause),
            }) => Err(cause.context(StepError::Failed(name))),
            _ => Ok(()),
        }
    }
}

/// Explicit registry of named steps.
#[derive(Default)]
pub struct StepRegistry {
    steps: BTreeMap<String, StepFn>,
}

impl StepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `step` as `<prefix>::<name>`, replacing any step already
    /// registered under that name.
    ///
    /// # Errors
    ///
    /// Returns `StepError::InvalidName` if either part is invalid.
    pub fn register<F, Fut>(&mut self, prefix: &str, name: &str, step: F) -> Result<()>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        validate_step_part(prefix)?;
        validate_step_part(name)?;
        let full = full_name(prefix, name);
        let boxed: StepFn = Box::new(move || -> StepFuture { Box::pin(step()) });
        if self.steps.insert(full.clone(), boxed).is_some() {
            tracing::debug!(step = %full, "step redefined");
        }
        Ok(())
    }

    /// Registers every step of a plan as a `sh -c` snippet.
    ///
    /// # Errors
    ///
    /// Returns an error if a plan step name is invalid.
    pub fn register_plan<R>(&mut self, plan: &Plan, runner: &Arc<R>, env: &EnvPatch) -> Result<()>
    where
        R: CommandRunner + 'static,
    {
        for (prefix, name, snippet) in plan.step_entries() {
            let step = shell_step(Arc::clone(runner), snippet.to_string(), env.clone());
            self.register(prefix, name, step)?;
        }
        Ok(())
    }

    /// All registered full names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The steps `run` would execute, in order.
    #[must_use]
    pub fn selection(&self, prefix: &str, start: Option<&str>) -> Vec<&str> {
        select_steps(self.names(), prefix, start)
    }

    /// Runs the steps under `prefix`, optionally resuming from `start`.
    ///
    /// Steps run sequentially; a failing step is recorded in the report and,
    /// under `FailurePolicy::FailFast`, stops the run.
    ///
    /// # Errors
    ///
    /// Returns `StepError::InvalidName` if `prefix` or `start` is invalid.
    /// Step failures are reported in the `StepReport`, not as errors.
    pub async fn run(
        &self,
        prefix: &str,
        start: Option<&str>,
        policy: FailurePolicy,
        reporter: &impl ProgressReporter,
    ) -> Result<StepReport> {
        validate_step_part(prefix)?;
        if let Some(start) = start {
            validate_step_part(start)?;
            tracing::warn!(prefix, start, "starting at step");
            reporter.warn(&format!("starting at {}", full_name(prefix, start)));
        }

        let mut report = StepReport::default();
        for name in self.selection(prefix, start) {
            let Some(step) = self.steps.get(name) else {
                continue;
            };
            tracing::info!(step = name, "running step");
            reporter.step(name);

            let error = step().await.err();
            if let Some(ref e) = error {
                tracing::warn!(step = name, error = %format!("{e:#}"), "step failed");
            }
            let failed = error.is_some();
            report.results.push(StepResult {
                name: name.to_string(),
                error,
            });
            if failed && policy == FailurePolicy::FailFast {
                break;
            }
        }
        Ok(report)
    }
}

/// Builds a step that runs `snippet` with `sh -c` and inherited stdio.
pub fn shell_step<R>(
    runner: Arc<R>,
    snippet: String,
    env: EnvPatch,
) -> impl Fn() -> StepFuture + 'static
where
    R: CommandRunner + 'static,
{
    move || -> StepFuture {
        let runner = Arc::clone(&runner);
        let snippet = snippet.clone();
        let env = env.clone();
        Box::pin(async move {
            let status = runner
                .run_status("sh", &["-c", snippet.as_str()], &env)
                .await
                .context("cannot run step")?;
            anyhow::ensure!(status.success(), "step exited with {status}");
            Ok(())
        })
    }
}
