//! External collaborator seams.
//!
//! The execution pipeline reads collections and variables from, and writes
//! history and run records to, externally owned stores. This module defines
//! those seams as traits so the pipeline stays decoupled from any
//! persistence mechanism, plus in-memory implementations used by tests and
//! embedders that manage their own persistence.

pub mod memory;

pub use memory::{
    InMemoryCollectionStore, InMemoryHistorySink, InMemoryRunStore, InMemoryVariableStore,
};

use crate::history::{HistoryEntry, HistoryError};
use crate::models::{Collection, RunIteration, RunResult};
use serde::{Deserialize, Serialize};

/// A named variable in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name, unique within its scope.
    pub key: String,

    /// Variable value.
    pub value: String,

    /// Disabled variables are excluded from their scope entirely.
    pub enabled: bool,
}

impl Variable {
    /// Creates an enabled variable.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// Errors raised by run-record persistence.
#[derive(Debug)]
pub enum StoreError {
    /// The targeted record does not exist.
    NotFound(String),
    /// The underlying storage failed.
    Storage(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "Not found: {}", what),
            StoreError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read-only provider of eagerly-loaded collection trees.
pub trait CollectionStore: Send + Sync {
    /// Fetches a collection with all folders and requests, or `None` if the
    /// id is unknown.
    fn collection(&self, id: &str) -> Option<Collection>;
}

/// Read-only provider of scoped variables.
///
/// Each accessor returns every variable of the scope, enabled or not; the
/// variable resolver filters disabled entries.
pub trait VariableStore: Send + Sync {
    /// Team-wide global variables.
    fn global_variables(&self, team_id: &str) -> Vec<Variable>;

    /// Variables attached to a collection.
    fn collection_variables(&self, collection_id: &str) -> Vec<Variable>;

    /// Variables attached to an environment.
    fn environment_variables(&self, environment_id: &str) -> Vec<Variable>;
}

/// Sink for executed-request history records.
pub trait HistorySink: Send + Sync {
    /// Persists one entry and returns the stored record's id.
    fn save(&self, entry: &HistoryEntry) -> Result<String, HistoryError>;
}

impl HistorySink for crate::history::FileHistoryStore {
    fn save(&self, entry: &HistoryEntry) -> Result<String, HistoryError> {
        self.append(entry)
    }
}

/// Persistence for run results and their iteration records.
pub trait RunStore: Send + Sync {
    /// Inserts a new run record.
    fn insert_run(&self, run: &RunResult) -> Result<(), StoreError>;

    /// Replaces an existing run record.
    fn update_run(&self, run: &RunResult) -> Result<(), StoreError>;

    /// Fetches a run by id.
    fn run(&self, id: &str) -> Option<RunResult>;

    /// Lists runs for a collection, most recently started first.
    fn runs_for_collection(&self, collection_id: &str) -> Vec<RunResult>;

    /// Appends one iteration record. Iteration records are never updated.
    fn append_iteration(&self, iteration: &RunIteration) -> Result<(), StoreError>;

    /// Fetches a run's iteration records in append order.
    fn iterations(&self, run_id: &str) -> Vec<RunIteration>;
}
