//! Collection Runner
//!
//! This crate implements the request execution and automation pipeline of an
//! HTTP API client: named requests enriched with templated variables,
//! declarative authentication, and user-authored scripts, executed singly or
//! as ordered, data-driven collection runs with recorded pass/fail outcomes.
//!
//! # Architecture
//!
//! The crate is organized into leaf-first modules:
//!
//! - **models**: Core data structures for requests, responses, collection
//!   trees, and run results
//! - **store**: Collaborator seams for collections, variables, history, and
//!   run persistence, plus in-memory implementations
//! - **variables**: Four-scope variable merging and `{{name}}` substitution,
//!   including dynamic variables
//! - **auth**: Declarative auth configurations resolved into concrete
//!   header/query values
//! - **executor**: HTTP execution with manual redirect handling, synthetic
//!   failure responses, and history capture
//! - **history**: History entry models and the JSONL file sink
//! - **script**: The sandboxed `pm.*` scripting engine for pre-request and
//!   post-response hooks
//! - **runner**: The orchestrator that linearizes a collection and drives it
//!   through iterations and data rows
//!
//! # Running a collection
//!
//! ```no_run
//! use collection_runner::executor::ExecutionConfig;
//! use collection_runner::models::{Collection, RunRequest};
//! use collection_runner::runner::CollectionRunner;
//! use collection_runner::script::ScriptConfig;
//! use collection_runner::store::{
//!     InMemoryCollectionStore, InMemoryHistorySink, InMemoryRunStore, InMemoryVariableStore,
//! };
//! use std::sync::Arc;
//!
//! let collections = Arc::new(InMemoryCollectionStore::new());
//! collections.put(Collection::new("col-1", "Smoke Tests"));
//!
//! let runner = CollectionRunner::new(
//!     collections,
//!     Arc::new(InMemoryVariableStore::new()),
//!     Arc::new(InMemoryHistorySink::new()),
//!     Arc::new(InMemoryRunStore::new()),
//!     ExecutionConfig::default(),
//!     ScriptConfig::default(),
//! );
//!
//! let detail = runner
//!     .start_run(&RunRequest::new("col-1"), "team-1", "user-1")
//!     .unwrap();
//! println!("run finished: {}", detail.result.status);
//! ```
//!
//! # Failure model
//!
//! Two failure classes are data, not errors: network problems become a
//! synthetic response with status 0, and script problems become a single
//! failing `"Script execution"` assertion. A failing request never aborts
//! the rest of a run. Typed [`runner::RunnerError`] values are reserved for
//! validation and not-found conditions raised before any execution starts.

pub mod auth;
pub mod executor;
pub mod history;
pub mod models;
pub mod runner;
pub mod script;
pub mod store;
pub mod variables;
