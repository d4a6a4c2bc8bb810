//! History record data models.
//!
//! A history entry captures one executed request/response pair for later
//! inspection. Entries are prepared for storage by truncating oversized
//! response bodies, so the history file stays bounded even when an API
//! returns very large payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum stored response-body length in bytes. Longer bodies are cut to
/// this size and suffixed with [`TRUNCATION_MARKER`].
pub const HISTORY_BODY_TRUNCATE_SIZE: usize = 10_000;

/// Marker appended to truncated response bodies.
pub const TRUNCATION_MARKER: &str = "[truncated]";

/// Errors that can occur while persisting or loading history records.
#[derive(Debug)]
pub enum HistoryError {
    /// Underlying file I/O failed.
    StorageError(std::io::Error),
    /// A record could not be serialized or deserialized.
    SerializationError(serde_json::Error),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::StorageError(err) => write!(f, "History storage error: {}", err),
            HistoryError::SerializationError(err) => {
                write!(f, "History serialization error: {}", err)
            }
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        HistoryError::StorageError(err)
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        HistoryError::SerializationError(err)
    }
}

/// One executed request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique record identifier.
    pub id: String,

    /// When the request completed.
    pub timestamp: DateTime<Utc>,

    /// Id of the user who executed the request.
    pub user_id: String,

    /// Request method as a string.
    pub request_method: String,

    /// Fully resolved request URL.
    pub request_url: String,

    /// Request headers as sent.
    pub request_headers: HashMap<String, String>,

    /// Request body as sent, if any.
    pub request_body: Option<String>,

    /// Response status code (0 for network failures).
    pub status_code: u16,

    /// Response status text.
    pub status_text: String,

    /// Response headers.
    pub response_headers: HashMap<String, String>,

    /// Response body, possibly truncated for storage.
    pub response_body: String,

    /// Total response time in milliseconds.
    pub duration_ms: u64,

    /// Response size in bytes (before truncation).
    pub size_bytes: usize,
}

impl HistoryEntry {
    /// Creates a new entry with a fresh id and the current timestamp.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id: user_id.into(),
            request_method: String::new(),
            request_url: String::new(),
            request_headers: HashMap::new(),
            request_body: None,
            status_code: 0,
            status_text: String::new(),
            response_headers: HashMap::new(),
            response_body: String::new(),
            duration_ms: 0,
            size_bytes: 0,
        }
    }

    /// Returns a copy ready for storage, with the response body truncated to
    /// [`HISTORY_BODY_TRUNCATE_SIZE`] bytes when it exceeds that size.
    ///
    /// The cut is made on a UTF-8 character boundary at or below the limit,
    /// and the [`TRUNCATION_MARKER`] is appended so readers can tell the
    /// stored body is incomplete.
    pub fn prepare_for_storage(&self) -> Self {
        let mut prepared = self.clone();
        prepared.response_body = truncate_body(&self.response_body, HISTORY_BODY_TRUNCATE_SIZE);
        prepared
    }
}

/// Truncates `body` to at most `limit` bytes on a character boundary and
/// appends the truncation marker. Bodies within the limit are returned
/// unchanged.
pub fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }

    let mut cut = limit;
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut truncated = body[..cut].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_body_unchanged() {
        let body = "small response";
        assert_eq!(truncate_body(body, 100), body);
    }

    #[test]
    fn test_long_body_truncated_with_marker() {
        let body = "x".repeat(HISTORY_BODY_TRUNCATE_SIZE + 500);
        let truncated = truncate_body(&body, HISTORY_BODY_TRUNCATE_SIZE);

        assert!(truncated.len() < HISTORY_BODY_TRUNCATE_SIZE + 50);
        assert!(truncated.contains(TRUNCATION_MARKER));
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // Multi-byte characters straddling the limit must not split.
        let body = "é".repeat(60);
        let truncated = truncate_body(&body, 101);

        assert!(truncated.ends_with(TRUNCATION_MARKER));
        // The prefix before the marker must still be valid UTF-8 of 'é'.
        let prefix = truncated.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert!(prefix.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_prepare_for_storage() {
        let mut entry = HistoryEntry::new("user-1");
        entry.response_body = "y".repeat(HISTORY_BODY_TRUNCATE_SIZE * 2);
        entry.size_bytes = entry.response_body.len();

        let prepared = entry.prepare_for_storage();

        assert!(prepared.response_body.len() < HISTORY_BODY_TRUNCATE_SIZE + 50);
        assert!(prepared.response_body.contains(TRUNCATION_MARKER));
        // Original size is preserved on the record.
        assert_eq!(prepared.size_bytes, HISTORY_BODY_TRUNCATE_SIZE * 2);
        assert_eq!(prepared.id, entry.id);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut entry = HistoryEntry::new("user-2");
        entry.request_method = "GET".to_string();
        entry.request_url = "https://api.example.com/users".to_string();
        entry.status_code = 200;

        let json = serde_json::to_string(&entry).unwrap();
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, entry.id);
        assert_eq!(back.request_url, entry.request_url);
        assert_eq!(back.status_code, 200);
    }
}
