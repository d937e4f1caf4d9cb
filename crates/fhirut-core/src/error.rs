//! Error types and handling for FHIR unit test execution

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for test execution
#[derive(Debug, Error)]
pub enum FhirutError {
    /// Missing validator artifact, instance resource or invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The validator did not finish within its wall-clock budget
    #[error("Validator timed out after {}s", .timeout.as_secs_f64())]
    Timeout { timeout: Duration, output: String },

    /// Validator output could not be interpreted as an OperationOutcome
    #[error("Failed to parse validator output: {message}")]
    Parse { message: String, raw_output: String },

    /// The validator exited with a non-zero code
    #[error("Validator exited with code {code}")]
    ValidatorExit { code: i32, output: String },

    /// Test definition could not be read or is invalid
    #[error("Invalid test definition '{path}': {message}")]
    DefinitionLoad { path: PathBuf, message: String },

    /// No test definitions could be found at the requested location
    #[error("Discovery error: {message}")]
    Discovery { message: String },

    /// File system I/O errors
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else that went wrong while running a test
    #[error("Execution error: {message}")]
    Execution { message: String },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Timeout,
    Parse,
    Execution,
    Definition,
    Discovery,
    Io,
}

impl FhirutError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FhirutError::Configuration { .. } => ErrorKind::Configuration,
            FhirutError::Timeout { .. } => ErrorKind::Timeout,
            FhirutError::Parse { .. } => ErrorKind::Parse,
            FhirutError::ValidatorExit { .. } => ErrorKind::Execution,
            FhirutError::Execution { .. } => ErrorKind::Execution,
            FhirutError::DefinitionLoad { .. } => ErrorKind::Definition,
            FhirutError::Discovery { .. } => ErrorKind::Discovery,
            FhirutError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Engine output captured before the failure, if any
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            FhirutError::Timeout { output, .. } | FhirutError::ValidatorExit { output, .. } => {
                Some(output)
            }
            FhirutError::Parse { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a parse error that keeps the text it failed on
    pub fn parse(message: impl Into<String>, raw_output: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw_output: raw_output.into(),
        }
    }

    /// Create a test definition error
    pub fn definition(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DefinitionLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for FhirutError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}
