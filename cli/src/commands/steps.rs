//! `opskit steps`: run the steps of a plan file in order.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::step_runner::{FailurePolicy, StepRegistry};
use crate::output::TerminalReporter;

/// Arguments for the steps command.
#[derive(Args)]
pub struct StepsArgs {
    /// Plan file (YAML)
    pub plan: PathBuf,

    /// Step prefix; runs every `<prefix>::*` step
    pub prefix: String,

    /// Resume from this step name (without the prefix)
    #[arg(long, value_name = "NAME")]
    pub from: Option<String>,

    /// Run the remaining steps after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Print the steps that would run, without running them
    #[arg(long)]
    pub list: bool,
}

/// Run the steps command. Exits 1 if any step failed.
///
/// # Errors
///
/// Returns an error if the plan cannot be loaded or a name is invalid.
pub async fn run(app: &AppContext, args: &StepsArgs) -> Result<ExitCode> {
    let plan = super::load_plan(&args.plan)?;
    let mut registry = StepRegistry::new();
    registry.register_plan(&plan, &app.runner, &app.scope.env())?;

    if args.list {
        for name in registry.selection(&args.prefix, args.from.as_deref()) {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let policy = if args.keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::FailFast
    };
    let reporter = TerminalReporter::new(&app.output);
    let report = registry
        .run(&args.prefix, args.from.as_deref(), policy, &reporter)
        .await?;

    if report.results.is_empty() {
        reporter.warn(&format!("no steps match {}::*", args.prefix));
    }
    let mut failed = false;
    for failure in report.failures() {
        failed = true;
        if let Some(error) = &failure.error {
            app.output.error(&format!("{}: {error:#}", failure.name));
        }
    }
    if failed {
        return Ok(ExitCode::FAILURE);
    }
    reporter.success(&format!("{} step(s) completed", report.results.len()));
    Ok(ExitCode::SUCCESS)
}
