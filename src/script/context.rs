//! Script execution context.
//!
//! One [`ScriptContext`] is created per request-in-iteration and threaded
//! through the whole script chain for that request: collection pre, folder
//! pre, request pre, then, after the HTTP call, request post, folder post,
//! collection post. Pre-request mutations to the request fields are applied
//! back onto the outgoing call; variable writes persist into the run's
//! variable state; console lines and assertions accumulate across stages.

use crate::models::{AssertionResult, HttpMethod};
use std::collections::HashMap;

/// Mutable state shared by every script stage of one request.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    /// Request method. Read-only from scripts.
    pub request_method: HttpMethod,

    /// Request URL. Rewritable from pre-request scripts.
    pub request_url: String,

    /// Request headers. Rewritable from pre-request scripts.
    pub request_headers: HashMap<String, String>,

    /// Request body. Rewritable from pre-request scripts.
    pub request_body: Option<String>,

    /// Set by `pm.request.cancel()`; the orchestrator skips the HTTP call.
    pub cancelled: bool,

    /// Response status code. Populated before post-response scripts run.
    pub response_status: Option<u16>,

    /// Response status text.
    pub response_status_text: Option<String>,

    /// Response headers.
    pub response_headers: HashMap<String, String>,

    /// Response body text.
    pub response_body: Option<String>,

    /// Response time in milliseconds.
    pub response_time_ms: Option<u64>,

    /// Team-wide global variables (run-local snapshot).
    pub globals: HashMap<String, String>,

    /// Collection variables (run-local snapshot).
    pub collection_variables: HashMap<String, String>,

    /// Environment variables (run-local snapshot).
    pub environment: HashMap<String, String>,

    /// Run-scoped local variables, including data-file row entries.
    pub local_variables: HashMap<String, String>,

    /// Console lines appended by `console.log` / `console.warn`.
    pub console_output: Vec<String>,

    /// Assertions recorded by `pm.test` blocks and script failures.
    pub assertions: Vec<AssertionResult>,
}

impl ScriptContext {
    /// Creates an empty context for a GET request with no URL.
    pub fn new() -> Self {
        Self {
            request_method: HttpMethod::GET,
            request_url: String::new(),
            request_headers: HashMap::new(),
            request_body: None,
            cancelled: false,
            response_status: None,
            response_status_text: None,
            response_headers: HashMap::new(),
            response_body: None,
            response_time_ms: None,
            globals: HashMap::new(),
            collection_variables: HashMap::new(),
            environment: HashMap::new(),
            local_variables: HashMap::new(),
            console_output: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Looks up a variable through the effective precedence chain:
    /// local > environment > collection > global.
    pub fn effective_variable(&self, key: &str) -> Option<&String> {
        self.local_variables
            .get(key)
            .or_else(|| self.environment.get(key))
            .or_else(|| self.collection_variables.get(key))
            .or_else(|| self.globals.get(key))
    }

    /// Builds the merged view of all four scopes with effective precedence.
    pub fn effective_variables(&self) -> HashMap<String, String> {
        let mut merged = self.globals.clone();
        merged.extend(self.collection_variables.clone());
        merged.extend(self.environment.clone());
        merged.extend(self.local_variables.clone());
        merged
    }

    /// Records a failing assertion, used for script-level failures.
    pub fn record_failure(&mut self, name: &str, message: impl Into<String>) {
        self.assertions.push(AssertionResult::fail(name, message));
    }
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}
