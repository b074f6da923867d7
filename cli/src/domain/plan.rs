//! Plan files: named shell steps and TAP tests.
//!
//! Pure parsing and validation; running the snippets is the job of the
//! step runner and harness services.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::error::StepError;
use crate::domain::steps::{split_name, validate_step_part};

/// A plan file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Plan {
    /// Full step name (`<prefix>::<name>`) → shell snippet.
    pub steps: BTreeMap<String, String>,
    /// Tests in execution order.
    pub tests: Vec<PlanTest>,
}

/// One test entry of a plan file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlanTest {
    /// Shell snippet; the test passes when it exits 0.
    pub run: String,
    /// Optional description appended to the TAP result line.
    #[serde(default)]
    pub description: Option<String>,
}

impl Plan {
    /// Parses and validates a plan from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a step name is not of
    /// the form `<prefix>::<name>` with valid parts.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(text).context("cannot parse plan")?;
        for name in plan.steps.keys() {
            let (prefix, step) =
                split_name(name).ok_or_else(|| StepError::InvalidName(name.clone()))?;
            validate_step_part(prefix)?;
            validate_step_part(step)?;
        }
        Ok(plan)
    }

    /// Iterates steps as `(prefix, name, snippet)`.
    pub fn step_entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.steps.iter().filter_map(|(full, snippet)| {
            split_name(full).map(|(prefix, name)| (prefix, name, snippet.as_str()))
        })
    }
}
