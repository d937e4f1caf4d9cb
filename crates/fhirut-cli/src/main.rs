//! fhirut CLI
//!
//! Command-line runner for declarative FHIR unit tests

mod output;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fhirut_core::{ConfigLoader, FhirutConfig, TestReport, TestRunner, init_tracing, loader};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

use crate::output::OutputFormatter;

/// Every test passed
const EXIT_PASSED: i32 = 0;
/// At least one test failed
const EXIT_TESTS_FAILED: i32 = 1;
/// The batch could not run at all
const EXIT_BATCH_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(name = "fut")]
#[command(about = "fhirut: declarative unit tests for FHIR resources")]
#[command(version = fhirut_core::VERSION)]
#[command(
    long_about = "fhirut runs declarative FHIR unit tests. Each YAML test names an instance\n\
resource, the implementation guides and profiles to validate it against, and the\n\
errors and warnings the HL7 validator is expected to report.\n\
\n\
Examples:\n  \
fut                               # Run the tests in the configured test directory\n  \
fut tests/                        # Run every test under tests/\n  \
fut 'tests/**/patient-*.yaml'     # Run the tests matching a glob\n  \
fut -j 4 -o reports tests/        # Four validators at once, write reports\n\
\n\
Exit status: 0 when every test passed, 1 when a test failed, 2 when the run\n\
could not start."
)]
struct Cli {
    /// Test definition files, directories or glob patterns
    #[arg(help = "Tests to run (default: runner.testDir from the configuration)")]
    tests: Vec<String>,

    /// Report output directory
    #[arg(
        short,
        long,
        help = "Write fhirut-report.json and fhirut-report.md to this directory"
    )]
    output: Option<PathBuf>,

    /// Configuration file path
    #[arg(
        short,
        long,
        env = "FHIRUT_CONFIG",
        help = "Path to configuration file (fhirut.yaml/.json/.toml)"
    )]
    config: Option<PathBuf>,

    /// Validator timeout in seconds
    #[arg(short, long, help = "Seconds each validator run may take")]
    timeout: Option<u64>,

    /// Number of validator processes to run at once
    #[arg(
        short = 'j',
        long,
        help = "Validator processes to run at once (0 = number of CPU cores)"
    )]
    jobs: Option<usize>,

    /// Path to validator_cli.jar
    #[arg(long, env = "FHIRUT_VALIDATOR_JAR", help = "Path to validator_cli.jar")]
    validator_jar: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "human", help = "Output format for results")]
    format: OutputFormat,

    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    /// Human-readable output with colors
    Human,
    /// JSON report for programmatic consumption
    Json,
    /// One line per difference plus a summary
    Compact,
}

fn main() {
    let cli = Cli::parse();

    let use_colors =
        !cli.no_color && std::env::var("NO_COLOR").is_err() && std::io::stdout().is_terminal();
    colored::control::set_override(use_colors);

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "error", // Only errors by default
        1 => "warn",
        2 => "info",  // Per-test verdicts
        3 => "debug", // Validator command lines
        _ => "trace",
    };
    unsafe {
        std::env::set_var("RUST_LOG", format!("fhirut={log_level},fut={log_level}"));
    }
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            std::process::exit(EXIT_BATCH_FAILURE);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(report) if report.all_passed() => std::process::exit(EXIT_PASSED),
        Ok(_) => std::process::exit(EXIT_TESTS_FAILED),
        Err(e) => {
            error!("Test run failed: {:#}", e);
            std::process::exit(EXIT_BATCH_FAILURE);
        }
    }
}

async fn run(cli: Cli) -> Result<TestReport> {
    let config = load_config(&cli)?;
    let started = Instant::now();
    let runner = TestRunner::new(config.clone());

    let results = if cli.tests.is_empty() {
        info!(
            "No tests named, running {}",
            config.runner.test_dir.display()
        );
        runner.run_directory(&config.runner.test_dir).await?
    } else {
        let files = collect_test_files(&cli.tests, &config.runner.definitions_dir)?;
        runner.run_files(&files).await
    };

    let report = TestReport::new(results);
    OutputFormatter::new(cli.format).print_results(&report, started.elapsed())?;

    if let Some(dir) = &cli.output {
        let (json_path, md_path) = report.save(dir)?;
        eprintln!(
            "Reports written to {} and {}",
            json_path.display(),
            md_path.display()
        );
    }

    Ok(report)
}

/// Load the configuration file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<FhirutConfig> {
    let mut config = ConfigLoader::load(cli.config.as_deref(), None)?;

    if let Some(timeout) = cli.timeout {
        config.validator.timeout_secs = timeout;
    }
    if let Some(jobs) = cli.jobs {
        config.runner.jobs = if jobs == 0 { num_cpus::get() } else { jobs };
    }
    if let Some(jar) = &cli.validator_jar {
        config.validator.jar = jar.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Expand command-line test arguments into definition files, in argument order
fn collect_test_files(args: &[String], definitions_dir: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for arg in args {
        let path = Path::new(arg);
        let found = if path.is_dir() {
            loader::discover(path, definitions_dir)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else if is_glob_pattern(arg) {
            let matches = expand_glob(arg)?;
            if matches.is_empty() {
                bail!("No test files match pattern '{arg}'");
            }
            matches
        } else {
            bail!("Test file or directory not found: {arg}");
        };

        for file in found {
            if !files.contains(&file) {
                files.push(file);
            }
        }
    }

    Ok(files)
}

fn is_glob_pattern(arg: &str) -> bool {
    arg.contains(['*', '?', '['])
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    for entry in glob::glob(pattern).with_context(|| format!("Invalid glob pattern '{pattern}'"))? {
        let path = entry.with_context(|| format!("Failed to read match for '{pattern}'"))?;
        if path.is_file() && loader::is_definition_file(&path) {
            matches.push(path);
        }
    }
    Ok(matches)
}
