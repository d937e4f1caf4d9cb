//! FHIRUT Core
//!
//! Engine for declarative FHIR unit tests. A test names an instance
//! resource, the implementation guides and profiles to validate it against,
//! and the findings it expects. This crate runs the external HL7 validator
//! for each test, parses the `OperationOutcome` it prints and diffs it
//! against the expectations.
//!
//! Components, leaves first:
//! - [`invoker`] - builds the validator command line and runs it with a timeout
//! - [`outcome`] - parses validator output into an [`Outcome`]
//! - [`diff`] - pure comparison of an outcome with [`ExpectedResults`]
//! - [`runner`] - drives the pipeline for a batch of tests

pub mod config;
pub mod diff;
pub mod error;
pub mod invoker;
pub mod loader;
pub mod model;
pub mod outcome;
pub mod report;
pub mod result;
pub mod runner;

// Re-export commonly used types
pub use config::{ConfigLoader, FhirutConfig, RunnerConfig, ValidatorConfig};
pub use error::{ErrorKind, FhirutError};
pub use invoker::{CommandSpec, ProcessOutput, ProcessRunner, TokioProcessRunner, ValidatorInvoker};
pub use model::{
    DiffKind, ExpectedResults, Issue, Outcome, Severity, TestContext, TestDefinition, TestResult,
    ValidationDiff,
};
pub use report::TestReport;
pub use result::Result;
pub use runner::TestRunner;

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fhirut=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
