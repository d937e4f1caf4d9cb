//! Output formatting and reporting
//!
//! Renders a finished [`TestReport`] to stdout in one of the supported formats.

use anyhow::{Context, Result};
use colored::*;
use fhirut_core::{DiffKind, TestReport, TestResult};
use std::time::Duration;

use crate::OutputFormat;

/// Output formatter for different formats
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format and print test results
    pub fn print_results(&self, report: &TestReport, elapsed: Duration) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                self.print_human_format(report, elapsed);
                Ok(())
            }
            OutputFormat::Json => self.print_json_format(report),
            OutputFormat::Compact => {
                self.print_compact_format(report);
                Ok(())
            }
        }
    }

    fn print_human_format(&self, report: &TestReport, elapsed: Duration) {
        for result in &report.results {
            print_result_line(result);
        }
        self.print_summary_human(report, elapsed);
    }

    fn print_summary_human(&self, report: &TestReport, elapsed: Duration) {
        println!("\n{}", "Summary:".bold());
        println!("  Tests run: {}", report.total_tests);
        println!("  Passed: {}", report.passed_tests.to_string().green());
        if report.failed_tests > 0 {
            println!("  Failed: {}", report.failed_tests.to_string().red());
        }
        for (kind, count) in &report.differences_by_kind {
            println!("    {kind}: {count}");
        }
        println!("  Pass rate: {:.1}%", report.pass_rate);
        println!("  Time: {}", utils::format_duration(elapsed));
    }

    fn print_json_format(&self, report: &TestReport) -> Result<()> {
        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize test report")?;
        println!("{json}");
        Ok(())
    }

    fn print_compact_format(&self, report: &TestReport) {
        for result in report.results.iter().filter(|r| !r.passed) {
            for diff in &result.differences {
                println!("{}: {}: {}", result.test_id, diff.kind, diff.message);
            }
        }
        println!(
            "fut: {} tests, {} passed, {} failed",
            report.total_tests, report.passed_tests, report.failed_tests
        );
    }
}

fn print_result_line(result: &TestResult) {
    let duration = utils::format_duration(Duration::from_millis(result.duration_ms));

    if result.passed {
        println!(
            "{} {} {}",
            "✓ PASS".green(),
            result.test_id,
            format!("({duration})").dimmed()
        );
        return;
    }

    println!(
        "{} {} {}",
        "✗ FAIL".red().bold(),
        result.test_id,
        format!("({duration})").dimmed()
    );
    for diff in &result.differences {
        let kind = match diff.kind {
            DiffKind::MissingWarning => diff.kind.as_str().yellow(),
            _ => diff.kind.as_str().red(),
        };
        match &diff.location {
            Some(location) => println!("    [{kind}] {} ({location})", diff.message),
            None => println!("    [{kind}] {}", diff.message),
        }
    }
}

/// Utility functions for output formatting
pub mod utils {
    /// Format duration in human-readable format
    pub fn format_duration(duration: std::time::Duration) -> String {
        let total_ms = duration.as_millis();

        if total_ms < 1000 {
            format!("{total_ms}ms")
        } else if total_ms < 60_000 {
            format!("{:.1}s", total_ms as f64 / 1000.0)
        } else {
            let minutes = total_ms / 60_000;
            let seconds = (total_ms % 60_000) as f64 / 1000.0;
            format!("{minutes}m {seconds:.1}s")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::time::Duration;

        #[test]
        fn test_format_duration() {
            assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
            assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
            assert_eq!(format_duration(Duration::from_secs(90)), "1m 30.0s");
        }
    }
}
