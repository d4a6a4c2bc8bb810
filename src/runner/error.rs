//! Run orchestration error types.

use crate::store::StoreError;
use std::fmt;

/// Errors surfaced to callers of the run orchestrator.
///
/// Validation and not-found errors map to 4xx-equivalent semantics in the
/// calling layer. Request-level failures never appear here; they are
/// recorded as data on the run.
#[derive(Debug)]
pub enum RunnerError {
    /// The run configuration is invalid (zero iterations, unparseable data
    /// file).
    Validation(String),

    /// A referenced collection or run does not exist.
    NotFound(String),

    /// Run-record persistence failed.
    Storage(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Validation(msg) => write!(f, "Validation error: {}", msg),
            RunnerError::NotFound(what) => write!(f, "Not found: {}", what),
            RunnerError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<StoreError> for RunnerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => RunnerError::NotFound(what),
            StoreError::Storage(msg) => RunnerError::Storage(msg),
        }
    }
}
