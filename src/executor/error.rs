//! HTTP request execution error types.
//!
//! These errors are internal to the executor: every failure is converted at
//! the executor boundary into a synthetic [`crate::models::ProxyResponse`]
//! with status 0, so callers always receive response data.

use std::fmt;

/// Errors that can occur during HTTP request execution.
#[derive(Debug)]
pub enum RequestError {
    /// Network error occurred during request execution.
    ///
    /// This includes connection failures, DNS resolution errors,
    /// and other network-level issues.
    NetworkError(String),

    /// Request timed out before completion.
    Timeout,

    /// Invalid URL provided in the request.
    InvalidUrl(String),

    /// TLS/SSL error occurred during HTTPS connection.
    TlsError(String),

    /// Request building error.
    ///
    /// Errors that occur when constructing the HTTP call from the resolved
    /// request data, such as an invalid header name.
    BuildError(String),

    /// Unsupported protocol. Only HTTP and HTTPS are supported.
    UnsupportedProtocol(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            RequestError::Timeout => write!(f, "Request timed out"),
            RequestError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            RequestError::TlsError(msg) => write!(f, "TLS/SSL error: {}", msg),
            RequestError::BuildError(msg) => write!(f, "Request build error: {}", msg),
            RequestError::UnsupportedProtocol(protocol) => {
                write!(f, "Unsupported protocol: {}", protocol)
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// Convert reqwest errors to RequestError.
impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout
        } else if err.is_builder() {
            RequestError::BuildError(err.to_string())
        } else if err.to_string().contains("certificate")
            || err.to_string().contains("TLS")
            || err.to_string().contains("SSL")
        {
            RequestError::TlsError(err.to_string())
        } else {
            RequestError::NetworkError(err.to_string())
        }
    }
}

/// Convert URL parsing errors to RequestError.
impl From<url::ParseError> for RequestError {
    fn from(err: url::ParseError) -> Self {
        RequestError::InvalidUrl(err.to_string())
    }
}
