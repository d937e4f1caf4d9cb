//! Test run reports
//!
//! A [`TestReport`] wraps a finished batch of results with totals and run
//! metadata, and can be written out as JSON and Markdown.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::FhirutError;
use crate::model::{DiffKind, TestResult};
use crate::result::Result;

pub const JSON_REPORT_FILE: &str = "fhirut-report.json";
pub const MARKDOWN_REPORT_FILE: &str = "fhirut-report.md";

/// Summary of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    /// Share of passing tests, 0–100
    pub pass_rate: f64,
    /// Number of differences per kind across all tests
    pub differences_by_kind: BTreeMap<String, usize>,
    pub results: Vec<TestResult>,
    pub timestamp: String,
    pub fhirut_version: String,
}

impl TestReport {
    pub fn new(results: Vec<TestResult>) -> Self {
        let total_tests = results.len();
        let passed_tests = results.iter().filter(|r| r.passed).count();
        let pass_rate = if total_tests > 0 {
            (passed_tests as f64 / total_tests as f64) * 100.0
        } else {
            0.0
        };

        let mut differences_by_kind = BTreeMap::new();
        for diff in results.iter().flat_map(|r| &r.differences) {
            *differences_by_kind
                .entry(diff.kind.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total_tests,
            passed_tests,
            failed_tests: total_tests - passed_tests,
            pass_rate,
            differences_by_kind,
            results,
            timestamp: chrono::Utc::now().to_rfc3339(),
            fhirut_version: crate::VERSION.to_string(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed_tests == 0
    }

    /// Generate markdown report
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# FHIR Unit Test Report\n\n");
        let _ = writeln!(md, "**Generated**: {}", self.timestamp);
        let _ = writeln!(md, "**fhirut Version**: {}\n", self.fhirut_version);

        md.push_str("## Summary\n\n");
        let _ = writeln!(md, "- **Total Tests**: {}", self.total_tests);
        let _ = writeln!(md, "- **Passed**: {}", self.passed_tests);
        let _ = writeln!(md, "- **Failed**: {}", self.failed_tests);
        let _ = writeln!(md, "- **Pass Rate**: {:.2}%\n", self.pass_rate);

        if !self.differences_by_kind.is_empty() {
            md.push_str("## Differences by Kind\n\n");
            for (kind, count) in &self.differences_by_kind {
                let _ = writeln!(md, "- **{kind}**: {count}");
            }
            md.push('\n');
        }

        md.push_str("## Test Results\n\n");
        md.push_str("| Test | Status | Errors | Warnings | Differences | Time |\n");
        md.push_str("|------|--------|--------|----------|-------------|------|\n");
        for result in &self.results {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {}ms |",
                table_cell(&result.test_id),
                if result.passed { "PASS" } else { "FAIL" },
                result.outcome.count(crate::model::Severity::Error),
                result.outcome.count(crate::model::Severity::Warning),
                result.differences.len(),
                result.duration_ms
            );
        }

        let failed: Vec<_> = self.results.iter().filter(|r| !r.passed).collect();
        if !failed.is_empty() {
            md.push_str("\n## Failed Tests Detail\n\n");
            for result in failed {
                let _ = writeln!(md, "### {}\n", result.test_id);
                for diff in &result.differences {
                    let _ = write!(md, "- `{}` {}", diff.kind, diff.message);
                    if let Some(location) = &diff.location {
                        let _ = write!(md, " ({location})");
                    }
                    md.push('\n');
                }
                if let Some(raw) = &result.raw_output
                    && result.differences.iter().any(|d| d.kind == DiffKind::ExecutionError)
                    && !raw.trim().is_empty()
                {
                    md.push_str("\n<details><summary>Validator output</summary>\n\n```text\n");
                    md.push_str(raw.trim_end());
                    md.push_str("\n```\n\n</details>\n");
                }
                md.push('\n');
            }
        }

        md
    }

    /// Save report to `output_dir` as JSON and Markdown, returning both paths
    pub fn save(&self, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(output_dir).map_err(|e| FhirutError::io_error(output_dir, e))?;

        let json_path = output_dir.join(JSON_REPORT_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FhirutError::execution(format!("Failed to serialize report: {e}")))?;
        std::fs::write(&json_path, json).map_err(|e| FhirutError::io_error(&json_path, e))?;

        let md_path = output_dir.join(MARKDOWN_REPORT_FILE);
        std::fs::write(&md_path, self.to_markdown())
            .map_err(|e| FhirutError::io_error(&md_path, e))?;

        Ok((json_path, md_path))
    }
}

/// Keep a value inside its Markdown table cell
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
