//! HTTP request execution configuration.
//!
//! This module defines configuration options for HTTP request execution:
//! timeout settings and the manual-redirect cap.

use serde::{Deserialize, Serialize};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects followed before giving up.
pub const MAX_REDIRECT_COUNT: u32 = 10;

/// Configuration for HTTP request execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Request timeout in seconds.
    ///
    /// Maximum time to wait for a complete response (including connection,
    /// headers, and body download). Defaults to 30 seconds. A per-request
    /// override on the proxy request takes precedence.
    pub timeout_secs: u64,

    /// Redirect cap for the manual redirect loop.
    pub max_redirects: u32,
}

impl ExecutionConfig {
    /// Creates a new ExecutionConfig with the given timeout and the default
    /// redirect cap.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            max_redirects: MAX_REDIRECT_COUNT,
        }
    }

    /// Returns the timeout as a `std::time::Duration`.
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_redirects: MAX_REDIRECT_COUNT,
        }
    }
}
