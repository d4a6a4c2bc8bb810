//! Request history capture.
//!
//! When a request is executed with history capture enabled, the executor
//! persists one [`HistoryEntry`] per call through the configured sink.
//! Response bodies are truncated for storage so the history stays bounded.

pub mod models;
pub mod storage;

pub use models::{HistoryEntry, HistoryError, HISTORY_BODY_TRUNCATE_SIZE, TRUNCATION_MARKER};
pub use storage::FileHistoryStore;
