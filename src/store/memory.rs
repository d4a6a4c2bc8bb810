//! In-memory collaborator implementations.
//!
//! Thread-safe map-backed stores used by tests and by embedders that keep
//! collections and variables in their own persistence layer and only need
//! the pipeline itself.

use super::{CollectionStore, HistorySink, RunStore, StoreError, Variable, VariableStore};
use crate::history::{HistoryEntry, HistoryError};
use crate::models::{Collection, RunIteration, RunResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Map-backed collection provider.
#[derive(Default)]
pub struct InMemoryCollectionStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl InMemoryCollectionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a collection.
    pub fn put(&self, collection: Collection) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.id.clone(), collection);
    }
}

impl CollectionStore for InMemoryCollectionStore {
    fn collection(&self, id: &str) -> Option<Collection> {
        self.collections.lock().unwrap().get(id).cloned()
    }
}

/// Map-backed variable provider, keyed by owner id per scope.
#[derive(Default)]
pub struct InMemoryVariableStore {
    globals: Mutex<HashMap<String, Vec<Variable>>>,
    collections: Mutex<HashMap<String, Vec<Variable>>>,
    environments: Mutex<HashMap<String, Vec<Variable>>>,
}

impl InMemoryVariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a global variable for a team.
    pub fn add_global(&self, team_id: &str, variable: Variable) {
        self.globals
            .lock()
            .unwrap()
            .entry(team_id.to_string())
            .or_default()
            .push(variable);
    }

    /// Adds a collection variable.
    pub fn add_collection(&self, collection_id: &str, variable: Variable) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection_id.to_string())
            .or_default()
            .push(variable);
    }

    /// Adds an environment variable.
    pub fn add_environment(&self, environment_id: &str, variable: Variable) {
        self.environments
            .lock()
            .unwrap()
            .entry(environment_id.to_string())
            .or_default()
            .push(variable);
    }
}

impl VariableStore for InMemoryVariableStore {
    fn global_variables(&self, team_id: &str) -> Vec<Variable> {
        self.globals
            .lock()
            .unwrap()
            .get(team_id)
            .cloned()
            .unwrap_or_default()
    }

    fn collection_variables(&self, collection_id: &str) -> Vec<Variable> {
        self.collections
            .lock()
            .unwrap()
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    fn environment_variables(&self, environment_id: &str) -> Vec<Variable> {
        self.environments
            .lock()
            .unwrap()
            .get(environment_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Vec-backed history sink keeping saved entries for inspection.
#[derive(Default)]
pub struct InMemoryHistorySink {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryHistorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every saved entry, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl HistorySink for InMemoryHistorySink {
    fn save(&self, entry: &HistoryEntry) -> Result<String, HistoryError> {
        let prepared = entry.prepare_for_storage();
        let id = prepared.id.clone();
        self.entries.lock().unwrap().push(prepared);
        Ok(id)
    }
}

/// Map-backed run persistence.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<String, RunResult>>,
    iterations: Mutex<Vec<RunIteration>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for InMemoryRunStore {
    fn insert_run(&self, run: &RunResult) -> Result<(), StoreError> {
        self.runs
            .lock()
            .unwrap()
            .insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn update_run(&self, run: &RunResult) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().unwrap();
        if !runs.contains_key(&run.id) {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn run(&self, id: &str) -> Option<RunResult> {
        self.runs.lock().unwrap().get(id).cloned()
    }

    fn runs_for_collection(&self, collection_id: &str) -> Vec<RunResult> {
        let mut runs: Vec<RunResult> = self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.collection_id == collection_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    fn append_iteration(&self, iteration: &RunIteration) -> Result<(), StoreError> {
        self.iterations.lock().unwrap().push(iteration.clone());
        Ok(())
    }

    fn iterations(&self, run_id: &str) -> Vec<RunIteration> {
        self.iterations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.run_id == run_id)
            .cloned()
            .collect()
    }
}
