//! Collection run data models.
//!
//! A run is one execution of a collection across N iterations, optionally
//! driven by an external data file. These models capture the run request,
//! the aggregated run result with its status machine, and the append-only
//! per-request iteration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a collection run.
///
/// A run starts in `Running` and moves to exactly one terminal state.
/// Terminal states are final; a record in a terminal state is never mutated
/// again except to stamp `completed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The run is executing.
    Running,
    /// Every request passed.
    Completed,
    /// At least one request failed.
    Failed,
    /// The run was cancelled by the caller.
    Cancelled,
}

impl RunStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// Caller-supplied configuration for starting a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Collection to execute.
    pub collection_id: String,

    /// Environment whose variables apply, if any.
    pub environment_id: Option<String>,

    /// Number of passes over the linearized request list. Must be >= 1.
    pub iteration_count: u32,

    /// Pause between consecutive requests, in milliseconds.
    pub delay_between_requests_ms: u64,

    /// Name of the attached data file, recorded on the result.
    pub data_filename: Option<String>,

    /// Raw content of the attached data file (CSV or a JSON array).
    pub data_file_content: Option<String>,
}

impl RunRequest {
    /// Creates a single-iteration run request with no data file or delay.
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            environment_id: None,
            iteration_count: 1,
            delay_between_requests_ms: 0,
            data_filename: None,
            data_file_content: None,
        }
    }
}

/// One named pass/fail check produced by a `pm.test` block, or the synthetic
/// `"Script execution"` failure recorded for a broken or timed-out script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// Test name as given to `pm.test`.
    pub name: String,

    /// Whether the test body completed without an assertion failure.
    pub passed: bool,

    /// Failure detail; `None` for passing assertions.
    pub message: Option<String>,
}

impl AssertionResult {
    /// Records a passing assertion.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    /// Records a failing assertion with its message.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Aggregated result of one collection run.
///
/// Created when the run starts, mutated only by the orchestrator (and by
/// explicit cancellation) until it reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub id: String,

    /// Collection that was executed.
    pub collection_id: String,

    /// Environment in effect, if any.
    pub environment_id: Option<String>,

    /// Current lifecycle status.
    pub status: RunStatus,

    /// Requests processed across all iterations, including skipped ones.
    pub total_requests: u32,

    /// Requests whose final HTTP status indicated success.
    pub passed_requests: u32,

    /// Requests that failed or were skipped.
    pub failed_requests: u32,

    /// Assertions recorded across all scripts.
    pub total_assertions: u32,

    /// Assertions that passed.
    pub passed_assertions: u32,

    /// Assertions that failed.
    pub failed_assertions: u32,

    /// Wall-clock duration of the whole run, in milliseconds.
    pub total_duration_ms: u64,

    /// Configured iteration count.
    pub iteration_count: u32,

    /// Configured inter-request delay, in milliseconds.
    pub delay_between_requests_ms: u64,

    /// Name of the attached data file, if any.
    pub data_filename: Option<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunResult {
    /// Creates a new run record in `Running` state from a run request.
    pub fn start(request: &RunRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            collection_id: request.collection_id.clone(),
            environment_id: request.environment_id.clone(),
            status: RunStatus::Running,
            total_requests: 0,
            passed_requests: 0,
            failed_requests: 0,
            total_assertions: 0,
            passed_assertions: 0,
            failed_assertions: 0,
            total_duration_ms: 0,
            iteration_count: request.iteration_count,
            delay_between_requests_ms: request.delay_between_requests_ms,
            data_filename: request.data_filename.clone(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// One row per executed (or skipped) request within a run.
///
/// Iteration records are append-only; they are never updated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIteration {
    /// Unique record identifier.
    pub id: String,

    /// Owning run.
    pub run_id: String,

    /// 1-based iteration number this record belongs to.
    pub iteration_number: u32,

    /// Name of the stored request.
    pub request_name: String,

    /// Method of the stored request.
    pub request_method: String,

    /// URL after variable resolution (or the raw URL for skipped requests).
    pub request_url: String,

    /// Final HTTP status, `None` when the call was skipped.
    pub response_status: Option<u16>,

    /// Response time of the final attempt, `None` when skipped.
    pub response_time_ms: Option<u64>,

    /// Total processing time for this request including scripts.
    pub duration_ms: u64,

    /// Whether the request counted as passed.
    pub passed: bool,

    /// Assertions recorded by every script stage of this request.
    pub assertion_results: Vec<AssertionResult>,

    /// Failure or skip description ("Skipped by pre-request script", network
    /// failure text), if any.
    pub error_message: Option<String>,

    /// Console lines captured from every script stage of this request.
    pub console_output: Vec<String>,
}

/// A run result together with its ordered iteration records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResultDetail {
    /// The aggregated run record.
    pub result: RunResult,

    /// Per-request records in execution order.
    pub iterations: Vec<RunIteration>,
}
