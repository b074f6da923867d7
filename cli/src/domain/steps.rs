//! Step naming and ordering rules.
//!
//! Pure functions only. A step's full name is `<prefix>::<name>`; ordering is
//! the byte-wise ordering of full names.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::StepError;

/// Separator between a step prefix and the step name.
pub const STEP_SEPARATOR: &str = "::";

#[allow(clippy::expect_used)] // Compile-time constant pattern
static STEP_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"));

/// Validates one part (prefix or name) of a step name.
///
/// # Errors
///
/// Returns `StepError::InvalidName` if `part` is empty or contains characters
/// outside `[A-Za-z0-9_.-]`.
pub fn validate_step_part(part: &str) -> Result<(), StepError> {
    if STEP_PART.is_match(part) {
        Ok(())
    } else {
        Err(StepError::InvalidName(part.to_string()))
    }
}

/// Joins a prefix and a name into a full step name.
#[must_use]
pub fn full_name(prefix: &str, name: &str) -> String {
    format!("{prefix}{STEP_SEPARATOR}{name}")
}

/// Splits a full step name into `(prefix, name)` at the first separator.
#[must_use]
pub fn split_name(full: &str) -> Option<(&str, &str)> {
    full.split_once(STEP_SEPARATOR)
}

/// Selects the steps under `prefix` in execution order.
///
/// Names are sorted byte-wise. When `start` is given only names
/// `>= <prefix>::<start>` are kept; `start` does not have to name an existing
/// step.
#[must_use]
pub fn select_steps<'a, I>(names: I, prefix: &str, start: Option<&str>) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let head = format!("{prefix}{STEP_SEPARATOR}");
    let floor = start.map(|s| full_name(prefix, s));
    let mut selected: Vec<&str> = names
        .into_iter()
        .filter(|name| name.starts_with(&head))
        .filter(|name| floor.as_deref().is_none_or(|f| *name >= f))
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}
