//! Application service: TAP test harness.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Tests are registered with an optional description and run strictly in
//! registration order; a failing test never stops the run.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::ports::CommandRunner;
use crate::domain::env::EnvPatch;
use crate::domain::plan::Plan;
use crate::domain::tap;

/// Boxed future returned by a test.
pub type TestFuture = Pin<Box<dyn Future<Output = TestOutcome>>>;

type TestFn = Box<dyn Fn() -> TestFuture>;

/// Result of running one test: pass/fail plus its captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub passed: bool,
    pub output: String,
}

impl TestOutcome {
    #[must_use]
    pub fn pass(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn fail(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
        }
    }
}

/// Counts reported after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessSummary {
    pub total: usize,
    pub failed: usize,
}

impl HarnessSummary {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Test registry. Tests and descriptions are index-aligned.
#[derive(Default)]
pub struct TestHarness {
    tests: Vec<TestFn>,
    descriptions: Vec<String>,
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `test`; the description defaults to the empty string.
    pub fn register<F, Fut>(&mut self, test: F, description: Option<&str>)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.tests
            .push(Box::new(move || -> TestFuture { Box::pin(test()) }));
        self.descriptions
            .push(description.unwrap_or_default().to_string());
    }

    /// Registers every test of a plan as a `sh -c` snippet.
    pub fn register_plan<R>(&mut self, plan: &Plan, runner: &Arc<R>, env: &EnvPatch)
    where
        R: CommandRunner + 'static,
    {
        for test in &plan.tests {
            let case = command_test(Arc::clone(runner), test.run.clone(), env.clone());
            self.register(case, test.description.as_deref());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Runs every test and writes the TAP report to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to `out` fails; test failures are
    /// reported in the output and the summary.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<HarnessSummary> {
        writeln!(out, "{}", tap::TAP_VERSION).context("cannot write TAP report")?;
        writeln!(out, "{}", tap::plan_line(self.tests.len())).context("cannot write TAP report")?;

        let mut failed = 0;
        for (index, (test, description)) in self.tests.iter().zip(&self.descriptions).enumerate() {
            let number = index + 1;
            tracing::debug!(number, description = %description, "running test");
            let outcome = test().await;
            if !outcome.passed {
                failed += 1;
            }
            writeln!(out, "{}", tap::result_line(number, outcome.passed, description))
                .context("cannot write TAP report")?;
            for line in tap::diagnostic_lines(&outcome.output) {
                writeln!(out, "{line}").context("cannot write TAP report")?;
            }
            out.flush().context("cannot write TAP report")?;
        }

        Ok(HarnessSummary {
            total: self.tests.len(),
            failed,
        })
    }
}

/// Builds a test that runs `script` with `sh -c`, merging stderr into
/// stdout so the captured buffer keeps the interleaving.
pub fn command_test<R>(
    runner: Arc<R>,
    script: String,
    env: EnvPatch,
) -> impl Fn() -> TestFuture + 'static
where
    R: CommandRunner + 'static,
{
    move || -> TestFuture {
        let runner = Arc::clone(&runner);
        let wrapped = format!("exec 2>&1\n{script}");
        let env = env.clone();
        Box::pin(async move {
            match runner.run("sh", &["-c", wrapped.as_str()], &env).await {
                Ok(output) => {
                    let text = String::from_utf8_lossy(&output.stdout).into_owned();
                    TestOutcome {
                        passed: output.status.success(),
                        output: text,
                    }
                }
                Err(e) => TestOutcome::fail(format!("{e:#}")),
            }
        })
    }
}
