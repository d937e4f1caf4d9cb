//! OperationOutcome parsing
//!
//! The validator reports its findings as a FHIR `OperationOutcome` JSON
//! document. Only the fields the diff engine needs are read; everything
//! else in the document is ignored.

use serde::Deserialize;

use crate::error::FhirutError;
use crate::invoker::ProcessOutput;
use crate::model::{Issue, Outcome, Severity};
use crate::result::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperationOutcome {
    resource_type: String,
    #[serde(default)]
    issue: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    severity: Severity,
    #[serde(default)]
    diagnostics: Option<String>,
    #[serde(default)]
    details: Option<RawDetails>,
    #[serde(default)]
    expression: Vec<String>,
    #[serde(default)]
    location: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    #[serde(default)]
    text: Option<String>,
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        let diagnostics = raw
            .diagnostics
            .or_else(|| raw.details.and_then(|details| details.text))
            .unwrap_or_default();
        let location = raw
            .expression
            .into_iter()
            .next()
            .or_else(|| raw.location.into_iter().next());

        Issue {
            severity: raw.severity,
            diagnostics,
            location,
        }
    }
}

/// Parse validator output text into an [`Outcome`], keeping issue order
pub fn parse_outcome(text: &str) -> Result<Outcome> {
    let raw: RawOperationOutcome =
        serde_json::from_str(text.trim()).map_err(|e| FhirutError::parse(e.to_string(), text))?;

    if raw.resource_type != "OperationOutcome" {
        return Err(FhirutError::parse(
            format!(
                "expected an OperationOutcome, found resourceType '{}'",
                raw.resource_type
            ),
            text,
        ));
    }

    Ok(Outcome::new(raw.issue.into_iter().map(Issue::from).collect()))
}

/// Interpret a finished validator run.
///
/// A non-zero exit code is an error in its own right and the output is not
/// parsed.
pub fn interpret(output: ProcessOutput) -> Result<Outcome> {
    if !output.success() {
        return Err(FhirutError::ValidatorExit {
            code: output.exit_code,
            output: output.output,
        });
    }
    parse_outcome(&output.output)
}
