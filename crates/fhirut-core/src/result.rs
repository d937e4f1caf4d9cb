//! Result type alias for test execution

use crate::error::FhirutError;

/// Standard Result type for test execution
pub type Result<T> = std::result::Result<T, FhirutError>;
