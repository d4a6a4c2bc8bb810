//! Collection run orchestrator.
//!
//! A run linearizes a collection's folder/request tree into execution order,
//! then drives it through the configured number of iterations, optionally
//! cycling rows of an external data file. Around every HTTP call runs the
//! five-stage script chain (collection pre, folder pre, request pre, then
//! request post, folder post, collection post) against one shared
//! [`ScriptContext`] whose variable state is carried across the whole run.
//!
//! Failures are tolerated per request: a failed call or a broken script
//! marks its iteration record and the run keeps going. Only `cancel_run`
//! (checked cooperatively at the start of each request) ends a run early.

pub mod data;
pub mod error;

pub use error::RunnerError;

use crate::executor::{resolve_inherited_auth, ExecutionConfig, RequestExecutor};
use crate::models::{
    Collection, HeaderEntry, ProxyRequest, RequestBody, RequestDefinition, RunIteration,
    RunRequest, RunResult, RunResultDetail, RunStatus,
};
use crate::script::{
    execute_post_response_script, execute_pre_request_script, ScriptConfig, ScriptContext,
};
use crate::store::{CollectionStore, HistorySink, RunStore, Variable, VariableStore};
use chrono::Utc;
use data::DataRow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Run-local snapshot of the four variable scopes.
///
/// Fetched from the stores once when a run starts; script writes mutate the
/// snapshot (visible to later scripts in the same run) and are discarded
/// with it. Nothing is written back to the external stores.
struct RunVariableState {
    globals: HashMap<String, String>,
    collection: HashMap<String, String>,
    environment: HashMap<String, String>,
    local: HashMap<String, String>,
}

/// Drives collection runs.
pub struct CollectionRunner {
    collections: Arc<dyn CollectionStore>,
    variables: Arc<dyn VariableStore>,
    runs: Arc<dyn RunStore>,
    executor: RequestExecutor,
    script_config: ScriptConfig,
}

impl CollectionRunner {
    /// Creates a runner over the given collaborators.
    pub fn new(
        collections: Arc<dyn CollectionStore>,
        variables: Arc<dyn VariableStore>,
        history: Arc<dyn HistorySink>,
        runs: Arc<dyn RunStore>,
        execution_config: ExecutionConfig,
        script_config: ScriptConfig,
    ) -> Self {
        let executor = RequestExecutor::new(variables.clone(), history, execution_config);
        Self {
            collections,
            variables,
            runs,
            executor,
            script_config,
        }
    }

    /// Returns the collection's requests in execution order without
    /// executing anything: root-level requests first, then each folder's
    /// requests before its subfolders, folders in their explicit sort order.
    pub fn collect_requests_in_order(
        &self,
        collection_id: &str,
    ) -> Result<Vec<RequestDefinition>, RunnerError> {
        let collection = self
            .collections
            .collection(collection_id)
            .ok_or_else(|| RunnerError::NotFound(format!("collection {}", collection_id)))?;
        Ok(linearize_requests(&collection))
    }

    /// Executes a collection run synchronously and returns the completed
    /// result with its iteration records.
    ///
    /// The run is persisted in `Running` state before the first request and
    /// updated to a terminal state at the end. A failed request or script
    /// never aborts the run; cancellation via [`CollectionRunner::cancel_run`]
    /// is honored at the start of each request.
    pub fn start_run(
        &self,
        run_request: &RunRequest,
        team_id: &str,
        user_id: &str,
    ) -> Result<RunResultDetail, RunnerError> {
        if run_request.iteration_count == 0 {
            return Err(RunnerError::Validation(
                "iteration count must be at least 1".to_string(),
            ));
        }

        let collection = self
            .collections
            .collection(&run_request.collection_id)
            .ok_or_else(|| {
                RunnerError::NotFound(format!("collection {}", run_request.collection_id))
            })?;

        let data_rows: Vec<DataRow> = match &run_request.data_file_content {
            Some(content) => data::parse_data_file(run_request.data_filename.as_deref(), content)?,
            None => Vec::new(),
        };

        let mut run = RunResult::start(run_request);
        self.runs.insert_run(&run)?;

        log::info!(
            "run {} started: collection {}, {} iterations",
            run.id,
            collection.id,
            run.iteration_count
        );

        let ordered = linearize_requests(&collection);
        let started = Instant::now();

        if ordered.is_empty() {
            run.status = RunStatus::Completed;
            run.completed_at = Some(Utc::now());
            self.runs.update_run(&run)?;
            return self.detail(run);
        }

        let mut state = self.load_variable_state(team_id, &collection, run_request);
        let mut cancelled = false;

        'iterations: for iteration_number in 1..=run_request.iteration_count {
            let row = if data_rows.is_empty() {
                None
            } else {
                Some(&data_rows[(iteration_number as usize - 1) % data_rows.len()])
            };

            for (index, request_def) in ordered.iter().enumerate() {
                // Cooperative cancellation: checked only here, never
                // mid-script or mid-call.
                if let Some(stored) = self.runs.run(&run.id) {
                    if stored.status == RunStatus::Cancelled {
                        cancelled = true;
                        break 'iterations;
                    }
                }

                let record = self.process_request(
                    &run,
                    &collection,
                    request_def,
                    iteration_number,
                    row,
                    &mut state,
                    run_request,
                    team_id,
                    user_id,
                );

                run.total_requests += 1;
                if record.passed {
                    run.passed_requests += 1;
                } else {
                    run.failed_requests += 1;
                }
                for assertion in &record.assertion_results {
                    run.total_assertions += 1;
                    if assertion.passed {
                        run.passed_assertions += 1;
                    } else {
                        run.failed_assertions += 1;
                    }
                }

                self.runs.append_iteration(&record)?;

                let is_last = iteration_number == run_request.iteration_count
                    && index == ordered.len() - 1;
                if run_request.delay_between_requests_ms > 0 && !is_last {
                    std::thread::sleep(std::time::Duration::from_millis(
                        run_request.delay_between_requests_ms,
                    ));
                }
            }
        }

        run.total_duration_ms = started.elapsed().as_millis() as u64;

        if cancelled {
            run.status = RunStatus::Cancelled;
            run.completed_at = self
                .runs
                .run(&run.id)
                .and_then(|stored| stored.completed_at)
                .or_else(|| Some(Utc::now()));
        } else {
            run.status = if run.failed_requests == 0 {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            };
            run.completed_at = Some(Utc::now());
        }

        self.runs.update_run(&run)?;

        log::info!(
            "run {} finished: {} ({}/{} requests passed)",
            run.id,
            run.status,
            run.passed_requests,
            run.total_requests
        );

        self.detail(run)
    }

    /// Cancels a run. Only succeeds while the run is `Running`; the running
    /// orchestrator observes the new state at the start of the next request.
    pub fn cancel_run(&self, run_id: &str) -> Result<RunResult, RunnerError> {
        let mut run = self
            .runs
            .run(run_id)
            .ok_or_else(|| RunnerError::NotFound(format!("run {}", run_id)))?;

        if run.status != RunStatus::Running {
            return Err(RunnerError::Validation(format!(
                "run {} is not running (status: {})",
                run_id, run.status
            )));
        }

        run.status = RunStatus::Cancelled;
        run.completed_at = Some(Utc::now());
        self.runs.update_run(&run)?;
        Ok(run)
    }

    /// Fetches a run with its iteration records.
    pub fn run_detail(&self, run_id: &str) -> Result<RunResultDetail, RunnerError> {
        let run = self
            .runs
            .run(run_id)
            .ok_or_else(|| RunnerError::NotFound(format!("run {}", run_id)))?;
        self.detail(run)
    }

    /// Lists runs for a collection, most recently started first.
    pub fn runs_for_collection(&self, collection_id: &str) -> Vec<RunResult> {
        self.runs.runs_for_collection(collection_id)
    }

    fn detail(&self, run: RunResult) -> Result<RunResultDetail, RunnerError> {
        let iterations = self.runs.iterations(&run.id);
        Ok(RunResultDetail { result: run, iterations })
    }

    /// Snapshots the three shared variable scopes for the run.
    fn load_variable_state(
        &self,
        team_id: &str,
        collection: &Collection,
        run_request: &RunRequest,
    ) -> RunVariableState {
        RunVariableState {
            globals: enabled_map(self.variables.global_variables(team_id)),
            collection: enabled_map(self.variables.collection_variables(&collection.id)),
            environment: run_request
                .environment_id
                .as_deref()
                .map(|id| enabled_map(self.variables.environment_variables(id)))
                .unwrap_or_default(),
            local: HashMap::new(),
        }
    }

    /// Processes one request within one iteration: script chain, HTTP call,
    /// and the append-only iteration record.
    #[allow(clippy::too_many_arguments)]
    fn process_request(
        &self,
        run: &RunResult,
        collection: &Collection,
        request_def: &RequestDefinition,
        iteration_number: u32,
        row: Option<&DataRow>,
        state: &mut RunVariableState,
        run_request: &RunRequest,
        team_id: &str,
        user_id: &str,
    ) -> RunIteration {
        let started = Instant::now();
        let folder = request_def
            .folder_id
            .as_deref()
            .and_then(|id| collection.folder(id));

        // Fresh context per request-in-iteration, seeded from the run's
        // variable state plus the current data row.
        let mut ctx = ScriptContext::new();
        ctx.request_method = request_def.method;
        ctx.request_url = request_def.url.clone();
        ctx.request_headers = request_def
            .headers
            .iter()
            .filter(|h| h.enabled)
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        ctx.request_body = request_def.body.as_ref().map(|b| b.content.clone());
        ctx.globals = state.globals.clone();
        ctx.collection_variables = state.collection.clone();
        ctx.environment = state.environment.clone();
        ctx.local_variables = state.local.clone();
        if let Some(row) = row {
            for (key, value) in row {
                ctx.local_variables.insert(key.clone(), value.clone());
            }
        }

        // Pre-request chain: collection, folder, request.
        if let Some(script) = &collection.pre_request_script {
            execute_pre_request_script(script, &mut ctx, &self.script_config);
        }
        if let Some(script) = folder.and_then(|f| f.pre_request_script.as_ref()) {
            execute_pre_request_script(script, &mut ctx, &self.script_config);
        }
        if let Some(script) = &request_def.pre_request_script {
            execute_pre_request_script(script, &mut ctx, &self.script_config);
        }

        let record = if ctx.cancelled {
            log::debug!(
                "request '{}' skipped by pre-request script",
                request_def.name
            );
            self.skipped_record(run, request_def, iteration_number, &ctx, started)
        } else {
            let proxy = self.build_proxy_request(collection, request_def, run_request, &ctx);
            let response =
                self.executor
                    .execute_request(&proxy, team_id, user_id, Some(&ctx.local_variables));

            ctx.response_status = Some(response.status_code);
            ctx.response_status_text = Some(response.status_text.clone());
            ctx.response_headers = response.headers.clone();
            ctx.response_body = Some(response.body.clone());
            ctx.response_time_ms = Some(response.response_time_ms);

            // Post-response chain: request, folder, collection.
            if let Some(script) = &request_def.post_response_script {
                execute_post_response_script(script, &mut ctx, &self.script_config);
            }
            if let Some(script) = folder.and_then(|f| f.post_response_script.as_ref()) {
                execute_post_response_script(script, &mut ctx, &self.script_config);
            }
            if let Some(script) = &collection.post_response_script {
                execute_post_response_script(script, &mut ctx, &self.script_config);
            }

            let passed = response.is_success();
            let error_message = if response.status_code == 0 {
                Some(response.status_text.clone())
            } else {
                None
            };

            RunIteration {
                id: Uuid::new_v4().to_string(),
                run_id: run.id.clone(),
                iteration_number,
                request_name: request_def.name.clone(),
                request_method: request_def.method.to_string(),
                request_url: ctx.request_url.clone(),
                response_status: Some(response.status_code),
                response_time_ms: Some(response.response_time_ms),
                duration_ms: started.elapsed().as_millis() as u64,
                passed,
                assertion_results: ctx.assertions.clone(),
                error_message,
                console_output: ctx.console_output.clone(),
            }
        };

        // Variable mutations persist for the rest of the run, skip or not.
        state.globals = ctx.globals;
        state.collection = ctx.collection_variables;
        state.environment = ctx.environment;
        state.local = ctx.local_variables;

        record
    }

    /// Builds the executable request from the stored definition and the
    /// (possibly script-mutated) context.
    fn build_proxy_request(
        &self,
        collection: &Collection,
        request_def: &RequestDefinition,
        run_request: &RunRequest,
        ctx: &ScriptContext,
    ) -> ProxyRequest {
        let body = ctx.request_body.as_ref().map(|content| RequestBody {
            content: content.clone(),
            body_type: request_def
                .body
                .as_ref()
                .map(|b| b.body_type)
                .unwrap_or(crate::models::BodyType::Text),
        });

        ProxyRequest {
            method: request_def.method,
            url: ctx.request_url.clone(),
            headers: ctx
                .request_headers
                .iter()
                .map(|(name, value)| HeaderEntry::new(name.clone(), value.clone()))
                .collect(),
            body,
            auth: Some(resolve_inherited_auth(collection, request_def)),
            follow_redirects: request_def.follow_redirects,
            save_to_history: false,
            timeout_secs: None,
            collection_id: Some(collection.id.clone()),
            environment_id: run_request.environment_id.clone(),
        }
    }

    /// The iteration record for a request skipped by `pm.request.cancel()`.
    fn skipped_record(
        &self,
        run: &RunResult,
        request_def: &RequestDefinition,
        iteration_number: u32,
        ctx: &ScriptContext,
        started: Instant,
    ) -> RunIteration {
        RunIteration {
            id: Uuid::new_v4().to_string(),
            run_id: run.id.clone(),
            iteration_number,
            request_name: request_def.name.clone(),
            request_method: request_def.method.to_string(),
            request_url: ctx.request_url.clone(),
            response_status: None,
            response_time_ms: None,
            duration_ms: started.elapsed().as_millis() as u64,
            passed: false,
            assertion_results: ctx.assertions.clone(),
            error_message: Some("Skipped by pre-request script".to_string()),
            console_output: ctx.console_output.clone(),
        }
    }
}

/// Pre-order depth-first linearization of a collection.
///
/// Root-level requests come first in sort order; each folder's own requests
/// are emitted before its subfolders are drained, and sibling folders follow
/// their explicit sort order.
pub fn linearize_requests(collection: &Collection) -> Vec<RequestDefinition> {
    let mut ordered = Vec::new();

    for request in collection.folder_requests(None) {
        ordered.push(request.clone());
    }
    for folder in collection.child_folders(None) {
        visit_folder(collection, &folder.id, &mut ordered);
    }

    ordered
}

fn visit_folder(collection: &Collection, folder_id: &str, ordered: &mut Vec<RequestDefinition>) {
    for request in collection.folder_requests(Some(folder_id)) {
        ordered.push(request.clone());
    }
    for subfolder in collection.child_folders(Some(folder_id)) {
        visit_folder(collection, &subfolder.id, ordered);
    }
}

fn enabled_map(variables: Vec<Variable>) -> HashMap<String, String> {
    variables
        .into_iter()
        .filter(|v| v.enabled)
        .map(|v| (v.key, v.value))
        .collect()
}
