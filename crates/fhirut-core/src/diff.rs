//! Expected-versus-actual comparison
//!
//! [`compare`] is a pure function of an [`Outcome`] and an
//! [`ExpectedResults`]. Diffs always come out in the same order: the status
//! check first, then missing errors, then missing warnings, each in the
//! order the expectations were written.
//!
//! The check is one-sided. Every expected substring must be found, but
//! findings the test did not mention are never reported.

use crate::model::{DiffKind, ExpectedResults, Outcome, Severity, ValidationDiff};

/// Status label for an outcome that carries errors
const STATUS_ERROR: &str = "error";
const STATUS_SUCCESS: &str = "success";

/// Whether the outcome counts as failed validation.
///
/// Only `error` issues count; `fatal` issues do not.
pub fn has_errors(outcome: &Outcome) -> bool {
    outcome
        .issues
        .iter()
        .any(|issue| issue.severity == Severity::Error)
}

/// Compute every discrepancy between `outcome` and `expected`
pub fn compare(outcome: &Outcome, expected: &ExpectedResults) -> Vec<ValidationDiff> {
    let mut diffs = Vec::new();

    let has_errors = has_errors(outcome);
    let status_matches = expected.expects_failure() == Some(has_errors);
    if !status_matches {
        let actual = if has_errors { STATUS_ERROR } else { STATUS_SUCCESS };
        let wanted = if expected.status.is_empty() {
            "none"
        } else {
            expected.status.as_str()
        };
        diffs.push(ValidationDiff::new(
            DiffKind::StatusMismatch,
            format!("Expected: {wanted}, Actual: {actual}"),
            "error",
        ));
    }

    if let Some(errors) = &expected.errors {
        diffs.extend(
            missing(outcome, Severity::Error, errors).map(|text| {
                ValidationDiff::new(
                    DiffKind::MissingError,
                    format!("Expected error not found: {text}"),
                    "error",
                )
            }),
        );
    }

    if let Some(warnings) = &expected.warnings {
        diffs.extend(
            missing(outcome, Severity::Warning, warnings).map(|text| {
                ValidationDiff::new(
                    DiffKind::MissingWarning,
                    format!("Expected warning not found: {text}"),
                    "warning",
                )
            }),
        );
    }

    diffs
}

/// Compare and return the verdict together with the diffs
pub fn evaluate(outcome: &Outcome, expected: &ExpectedResults) -> (bool, Vec<ValidationDiff>) {
    let diffs = compare(outcome, expected);
    (diffs.is_empty(), diffs)
}

/// Expected substrings that no issue of `severity` contains
fn missing<'a>(
    outcome: &'a Outcome,
    severity: Severity,
    expected: &'a [String],
) -> impl Iterator<Item = &'a String> + 'a {
    expected.iter().filter(move |text| {
        !outcome
            .issues_with(severity)
            .any(|issue| issue.diagnostics.contains(text.as_str()))
    })
}
