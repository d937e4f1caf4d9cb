//! Test definitions, validation outcomes and test results
//!
//! Every type here is an immutable value: it is built once (by the loader,
//! the outcome parser or the diff engine) and never mutated afterwards.
//! Normalization such as path resolution produces a new value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single declarative test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub test_id: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub context: TestContext,

    /// FHIR resource to validate
    pub instance_path: PathBuf,

    pub expected_results: ExpectedResults,

    /// File this definition was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Validation context handed to the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestContext {
    /// Implementation guides, passed as `-ig <value>`
    #[serde(default)]
    pub igs: Vec<String>,

    /// Profiles, passed as `-profile <value>`
    #[serde(default)]
    pub profiles: Vec<String>,

    /// Supplementary resources loaded alongside the instance
    #[serde(default)]
    pub resources: Vec<PathBuf>,
}

/// What the test expects the engine to report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedResults {
    /// "success" or "error"; anything else, including absent, never matches
    #[serde(default)]
    pub status: String,

    /// Substrings that must each appear in some error diagnostic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,

    /// Substrings that must each appear in some warning diagnostic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,

    // Reserved for informational checks; not compared yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub informations: Option<Vec<String>>,

    // Carried through to reports, not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariants: Option<Vec<InvariantCheck>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub expression: String,
    pub expected: bool,
}

impl ExpectedResults {
    /// Expectation of a clean validation run
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            errors: None,
            warnings: None,
            informations: None,
            invariants: None,
        }
    }

    /// Expectation of a failing validation run with the given error substrings
    pub fn error<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: "error".to_string(),
            errors: Some(errors.into_iter().map(Into::into).collect()),
            ..Self::success()
        }
    }

    pub fn with_warnings<I, S>(self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            warnings: Some(warnings.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    /// `Some(true)` when an error outcome is expected, `Some(false)` for
    /// success, `None` for any status that can never match.
    pub fn expects_failure(&self) -> Option<bool> {
        if self.status.eq_ignore_ascii_case("error") {
            Some(true)
        } else if self.status.eq_ignore_ascii_case("success") {
            Some(false)
        } else {
            None
        }
    }
}

impl TestDefinition {
    pub fn new(
        test_id: impl Into<String>,
        instance_path: impl Into<PathBuf>,
        expected_results: ExpectedResults,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            description: None,
            context: TestContext::default(),
            instance_path: instance_path.into(),
            expected_results,
            source: None,
        }
    }

    pub fn with_context(self, context: TestContext) -> Self {
        Self { context, ..self }
    }

    pub fn with_source(self, source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    /// Resolve relative instance and resource paths against `base`
    pub fn resolve_paths(self, base: &Path) -> Self {
        let instance_path = resolve_against(base, &self.instance_path);
        let resources = self
            .context
            .resources
            .iter()
            .map(|resource| resolve_against(base, resource))
            .collect();

        Self {
            instance_path,
            context: TestContext {
                resources,
                ..self.context
            },
            ..self
        }
    }
}

/// Prefix used by test suites laid out for the JVM build tooling
const LEGACY_RESOURCE_PREFIX: &str = "src/test/resources/";

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let normalized = path.to_string_lossy().replace('\\', "/");
    let relative = normalized
        .strip_prefix(LEGACY_RESOURCE_PREFIX)
        .unwrap_or(&normalized);

    let mut resolved = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

/// Issue severity as reported by the validation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding emitted by the validation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub diagnostics: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, diagnostics: impl Into<String>) -> Self {
        Self {
            severity,
            diagnostics: diagnostics.into(),
            location: None,
        }
    }

}

/// Issues from one validator run, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub issues: Vec<Issue>,
}

impl Outcome {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// Stand-in outcome for runs that never produced one
    pub fn synthetic_failure(message: impl Into<String>) -> Self {
        Self {
            issues: vec![Issue::new(Severity::Fatal, message)],
        }
    }

    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(move |issue| issue.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues_with(severity).count()
    }
}

/// Category of a discrepancy between expected and actual results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    StatusMismatch,
    MissingError,
    MissingWarning,
    ExecutionError,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::StatusMismatch => "status_mismatch",
            DiffKind::MissingError => "missing_error",
            DiffKind::MissingWarning => "missing_warning",
            DiffKind::ExecutionError => "execution_error",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDiff {
    pub kind: DiffKind,
    pub message: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ValidationDiff {
    pub fn new(kind: DiffKind, message: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: severity.into(),
            location: None,
        }
    }

    pub fn at(self, location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..self
        }
    }
}

/// Verdict for one test definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub passed: bool,
    pub outcome: Outcome,
    pub differences: Vec<ValidationDiff>,

    /// Engine text kept when it could not be turned into an outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl TestResult {
    /// Build a result whose verdict follows from the diff list
    pub fn from_diffs(
        test_id: impl Into<String>,
        outcome: Outcome,
        differences: Vec<ValidationDiff>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            passed: differences.is_empty(),
            outcome,
            differences,
            raw_output: None,
            duration_ms: 0,
        }
    }

    /// Build a failed result for a test that could not be evaluated
    pub fn failed(
        test_id: impl Into<String>,
        message: impl Into<String>,
        location: Option<String>,
        raw_output: Option<String>,
    ) -> Self {
        let message = message.into();
        let diff = ValidationDiff::new(DiffKind::ExecutionError, message.clone(), "fatal");
        let diff = match location {
            Some(location) => diff.at(location),
            None => diff,
        };

        Self {
            test_id: test_id.into(),
            passed: false,
            outcome: Outcome::synthetic_failure(message),
            differences: vec![diff],
            raw_output,
            duration_ms: 0,
        }
    }

    pub fn with_duration(self, duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..self
        }
    }
}
