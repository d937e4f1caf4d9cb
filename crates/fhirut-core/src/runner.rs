//! Test runner
//!
//! Drives invoke → interpret → compare once per test definition. Any error
//! along the way becomes a failed [`TestResult`] for that test only; the
//! rest of the batch still runs. Results come back in input order, even
//! when several validator processes run at once.

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::FhirutConfig;
use crate::diff;
use crate::error::FhirutError;
use crate::invoker::{ProcessRunner, ValidatorInvoker};
use crate::loader;
use crate::model::{TestDefinition, TestResult};
use crate::outcome;
use crate::result::Result;

/// Runs batches of test definitions against the validator
pub struct TestRunner {
    invoker: ValidatorInvoker,
    jobs: usize,
    definitions_dir: String,
}

impl TestRunner {
    /// Create a runner that spawns the real validator
    pub fn new(config: FhirutConfig) -> Self {
        Self {
            invoker: ValidatorInvoker::new(config.validator),
            jobs: config.runner.jobs.max(1),
            definitions_dir: config.runner.definitions_dir,
        }
    }

    /// Create a runner with a custom process runner
    pub fn with_process_runner(config: FhirutConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            invoker: ValidatorInvoker::with_runner(config.validator, runner),
            jobs: config.runner.jobs.max(1),
            definitions_dir: config.runner.definitions_dir,
        }
    }

    /// Run one test definition. Never fails: errors become a failed result.
    pub async fn run_definition(&self, definition: &TestDefinition) -> TestResult {
        let started = Instant::now();

        let result = match AssertUnwindSafe(self.evaluate(definition))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!("Test '{}' could not be evaluated: {}", definition.test_id, err);
                failed_result(&definition.test_id, definition.source.as_deref(), &err)
            }
            Err(payload) => {
                let err = FhirutError::execution(format!(
                    "Test run panicked: {}",
                    panic_message(payload.as_ref())
                ));
                error!("Test '{}' aborted: {}", definition.test_id, err);
                failed_result(&definition.test_id, definition.source.as_deref(), &err)
            }
        };
        let result = result.with_duration(started.elapsed().as_millis() as u64);

        info!(
            "{} {} ({} difference(s))",
            if result.passed { "PASS" } else { "FAIL" },
            result.test_id,
            result.differences.len()
        );
        result
    }

    async fn evaluate(&self, definition: &TestDefinition) -> Result<TestResult> {
        let output = self.invoker.invoke(definition).await?;
        let outcome = outcome::interpret(output)?;
        let differences = diff::compare(&outcome, &definition.expected_results);
        Ok(TestResult::from_diffs(
            definition.test_id.clone(),
            outcome,
            differences,
        ))
    }

    /// Run test definitions, one result per definition, in input order
    pub async fn run_definitions(&self, definitions: &[TestDefinition]) -> Vec<TestResult> {
        debug!(
            "Running {} test(s) with up to {} validator process(es)",
            definitions.len(),
            self.jobs
        );
        stream::iter(definitions)
            .map(|definition| self.run_definition(definition))
            .buffered(self.jobs)
            .collect()
            .await
    }

    /// Load and run test definition files, in input order.
    ///
    /// A file that cannot be loaded yields a failed result named after the
    /// file.
    pub async fn run_files(&self, files: &[PathBuf]) -> Vec<TestResult> {
        stream::iter(files)
            .map(|file| async move {
                match loader::load_definition(file) {
                    Ok(definition) => self.run_definition(&definition).await,
                    Err(err) => {
                        warn!("Skipping {}: {}", file.display(), err);
                        failed_result(&file_test_id(file), Some(file), &err)
                    }
                }
            })
            .buffered(self.jobs)
            .collect()
            .await
    }

    /// Discover test definitions under `dir` and run them.
    ///
    /// Fails only when nothing could be discovered.
    pub async fn run_directory(&self, dir: &Path) -> Result<Vec<TestResult>> {
        let files = loader::discover(dir, &self.definitions_dir)?;
        info!("Found {} test file(s) in {}", files.len(), dir.display());
        Ok(self.run_files(&files).await)
    }
}

fn failed_result(test_id: &str, source: Option<&Path>, err: &FhirutError) -> TestResult {
    TestResult::failed(
        test_id,
        err.to_string(),
        source.map(|path| path.display().to_string()),
        err.raw_output().map(str::to_string),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn file_test_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
