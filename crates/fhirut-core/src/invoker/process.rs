//! Bounded-time external process execution
//!
//! The validator is opaque to us: we only need its combined output and its
//! exit code, obtained within a wall-clock budget. [`ProcessRunner`] is the
//! seam that lets tests replace the real subprocess with a fake.

use async_trait::async_trait;
use std::fmt;
use std::io::Read;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::FhirutError;
use crate::result::Result;

/// How long to keep draining the output pipe once the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Variables merged over the inherited environment
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// stdout and stderr, interleaved as written
    pub output: String,
    /// Exit code, or -1 when the process was terminated by a signal
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command and returns its combined output within `timeout`.
///
/// Implementations must fail with [`FhirutError::Timeout`] once the deadline
/// passes, after making sure the process is no longer running.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput> {
        // One pipe for both streams keeps stdout/stderr interleaving intact.
        let (mut reader, writer) = std::io::pipe()
            .map_err(|e| FhirutError::execution(format!("Failed to create output pipe: {e}")))?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| FhirutError::execution(format!("Failed to create output pipe: {e}")))?;

        debug!("Spawning: {}", command);

        // The Command owns the parent's copies of the write end; it must be
        // dropped right after spawning or the reader never sees EOF.
        let mut child = {
            let mut cmd = Command::new(&command.program);
            cmd.args(&command.args)
                .envs(command.env.iter().map(|(key, value)| (key, value)))
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr_writer)
                .kill_on_drop(true);
            // Own process group, so a timeout also takes down anything the
            // validator forked.
            #[cfg(unix)]
            cmd.process_group(0);
            cmd.spawn().map_err(|e| spawn_error(&command.program, e))?
        };
        let pid = child.id();

        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let mut reader_task = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => return Ok(()),
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
        });

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                match tokio::time::timeout(READER_GRACE, &mut reader_task).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(e))) => {
                        return Err(FhirutError::execution(format!(
                            "Failed to read validator output: {e}"
                        )));
                    }
                    Ok(Err(e)) => {
                        return Err(FhirutError::execution(format!(
                            "Output reader task failed: {e}"
                        )));
                    }
                    Err(_) => {
                        warn!(
                            "Output pipe still open after '{}' exited, killing leftover processes",
                            command.program
                        );
                        kill_process_group(pid);
                        let _ = tokio::time::timeout(READER_GRACE, &mut reader_task).await;
                    }
                }

                Ok(ProcessOutput {
                    output: take_output(&captured),
                    exit_code: status.code().unwrap_or(-1),
                })
            }
            Ok(Err(e)) => Err(FhirutError::execution(format!(
                "Failed to wait for '{}': {e}",
                command.program
            ))),
            Err(_) => {
                warn!("Validator timed out after {:?}: {}", timeout, command);
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out process: {}", e);
                }
                let _ = tokio::time::timeout(READER_GRACE, &mut reader_task).await;

                Err(FhirutError::Timeout {
                    timeout,
                    output: take_output(&captured),
                })
            }
        }
    }
}

/// SIGKILL every process in the group led by `pid`
#[cfg(unix)]
#[allow(clippy::cast_possible_wrap)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn spawn_error(program: &str, err: std::io::Error) -> FhirutError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FhirutError::configuration(format!("Validator program '{program}' not found: {err}"))
    } else {
        FhirutError::execution(format!("Failed to spawn '{program}': {err}"))
    }
}

fn take_output(captured: &Mutex<Vec<u8>>) -> String {
    let bytes = std::mem::take(&mut *captured.lock().unwrap_or_else(PoisonError::into_inner));
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("java")
            .args(["-jar", "validator_cli.jar"])
            .arg("patient.json");
        assert_eq!(spec.to_string(), "java -jar validator_cli.jar patient.json");
    }

    #[tokio::test]
    async fn test_missing_program_is_configuration_error() {
        let runner = TokioProcessRunner::new();
        let spec = CommandSpec::new("fhirut-definitely-not-installed-binary");

        let err = runner
            .run(&spec, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(err.to_string().contains("fhirut-definitely-not-installed-binary"));
    }
}
