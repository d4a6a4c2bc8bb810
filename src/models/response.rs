//! HTTP response data models.
//!
//! This module defines the response value produced by the request executor,
//! including status information, headers, body, timing, the redirect chain,
//! and the optional history record reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents the final HTTP response of one executed request.
///
/// Produced once per execution attempt: the final response after any
/// manually-followed redirects. Network failures are represented in-band:
/// a `status_code` of 0 with a descriptive `status_text` rather than an
/// error value, so that a failed call can still be recorded and reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyResponse {
    /// HTTP status code (e.g., 200, 404, 500). 0 for network failures.
    pub status_code: u16,

    /// HTTP status text (e.g., "OK", "Not Found"), or a descriptive message
    /// for synthetic responses ("Request timed out", "Max redirects
    /// exceeded").
    pub status_text: String,

    /// Response headers as key-value pairs.
    pub headers: HashMap<String, String>,

    /// Response body decoded as text. Binary bodies are replaced by their
    /// lossy UTF-8 rendering.
    pub body: String,

    /// Wall-clock time of the final attempt, in milliseconds.
    pub response_time_ms: u64,

    /// Response size in bytes (headers plus body).
    pub size_bytes: usize,

    /// Content-Type header of the response, if present.
    pub content_type: Option<String>,

    /// Every URL visited while following redirects, in visit order. Empty
    /// when the first response was not a redirect or redirect following was
    /// disabled.
    pub redirect_chain: Vec<String>,

    /// Identifier of the persisted history record. Populated only when
    /// history capture was requested and the sink write succeeded.
    pub history_id: Option<String>,
}

impl ProxyResponse {
    /// Creates a new ProxyResponse with the given status code and text.
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: HashMap::new(),
            body: String::new(),
            response_time_ms: 0,
            size_bytes: 0,
            content_type: None,
            redirect_chain: Vec::new(),
            history_id: None,
        }
    }

    /// Creates the synthetic response used for network-level failures.
    ///
    /// The status code is 0 and the text carries the failure description,
    /// keeping the failure as data instead of an error.
    pub fn network_failure(status_text: impl Into<String>) -> Self {
        Self::new(0, status_text)
    }

    /// Checks if the response status indicates success.
    ///
    /// Synthetic network-failure responses (status 0) are not successful.
    pub fn is_success(&self) -> bool {
        self.status_code >= 100 && self.status_code <= 399
    }

    /// Looks up a response header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
