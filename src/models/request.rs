//! HTTP request data models.
//!
//! This module defines the core data structures for describing one HTTP call:
//! the method, target URL, header entries, typed body, per-request auth
//! override, and execution flags (redirect following, history capture).

use crate::auth::AuthConfig;
use serde::{Deserialize, Serialize};

/// HTTP request method.
///
/// Represents the request methods supported by the runner, as defined in
/// RFC 7231 and RFC 5789.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// HTTP GET method - retrieve a resource
    GET,
    /// HTTP POST method - submit data to create a resource
    POST,
    /// HTTP PUT method - replace a resource
    PUT,
    /// HTTP DELETE method - remove a resource
    DELETE,
    /// HTTP PATCH method - partially modify a resource
    PATCH,
    /// HTTP OPTIONS method - describe communication options
    OPTIONS,
    /// HTTP HEAD method - retrieve headers only
    HEAD,
}

impl HttpMethod {
    /// Returns the string representation of the HTTP method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::HEAD => "HEAD",
        }
    }

    /// Parses a string into an HttpMethod.
    ///
    /// # Arguments
    ///
    /// * `s` - A string slice representing the HTTP method
    ///
    /// # Returns
    ///
    /// `Some(HttpMethod)` if the string is a valid HTTP method, `None` otherwise.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "HEAD" => Some(HttpMethod::HEAD),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single header row on a request.
///
/// Headers are kept as an ordered list rather than a map so that disabled
/// rows survive round-trips and duplicate names keep their relative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name as entered by the user.
    pub name: String,

    /// Header value. May contain `{{variable}}` placeholders resolved at
    /// execution time.
    pub value: String,

    /// Disabled entries are skipped entirely when the request is sent.
    pub enabled: bool,
}

impl HeaderEntry {
    /// Creates an enabled header entry.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// Body payload type, used to imply a Content-Type header when the request
/// does not declare one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    /// JSON payload (`application/json`)
    Json,
    /// Plain text payload (`text/plain`)
    Text,
    /// XML payload (`application/xml`)
    Xml,
    /// URL-encoded form payload (`application/x-www-form-urlencoded`)
    FormUrlEncoded,
}

impl BodyType {
    /// Returns the MIME type implied by this body type.
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyType::Json => "application/json",
            BodyType::Text => "text/plain",
            BodyType::Xml => "application/xml",
            BodyType::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

/// Raw request body with its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Raw body content. May contain `{{variable}}` placeholders.
    pub content: String,

    /// Declared payload type.
    pub body_type: BodyType,
}

impl RequestBody {
    /// Creates a JSON body.
    pub fn json(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            body_type: BodyType::Json,
        }
    }

    /// Creates a plain-text body.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            body_type: BodyType::Text,
        }
    }
}

/// One HTTP call ready for the executor.
///
/// This is the executable form of a request: everything the executor needs
/// to resolve variables, apply authentication, and send the call. Stored
/// request definitions (see [`crate::models::collection`]) are converted
/// into this shape by the orchestrator before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    /// HTTP method (GET, POST, PUT, DELETE, etc.).
    pub method: HttpMethod,

    /// Target URL. May contain `{{variable}}` placeholders resolved before
    /// execution.
    pub url: String,

    /// Request header rows in declaration order.
    pub headers: Vec<HeaderEntry>,

    /// Optional request body.
    pub body: Option<RequestBody>,

    /// Per-request authentication. `None` means the request carries no auth
    /// of its own; the caller may substitute an inherited configuration.
    pub auth: Option<AuthConfig>,

    /// When set, redirect responses are followed manually up to the
    /// configured redirect cap, recording each visited location.
    pub follow_redirects: bool,

    /// When set, the final response is persisted to the history sink.
    pub save_to_history: bool,

    /// Per-request timeout override in seconds.
    pub timeout_secs: Option<u64>,

    /// Collection whose variables and auth chain apply, if any.
    pub collection_id: Option<String>,

    /// Environment whose variables apply, if any.
    pub environment_id: Option<String>,
}

impl ProxyRequest {
    /// Creates a new ProxyRequest with the given method and URL.
    ///
    /// All optional fields start empty; redirects are followed by default
    /// and history capture is off.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            auth: None,
            follow_redirects: true,
            save_to_history: false,
            timeout_secs: None,
            collection_id: None,
            environment_id: None,
        }
    }

    /// Adds an enabled header entry.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(HeaderEntry::new(name, value));
    }

    /// Checks whether the request declares a header with the given name,
    /// ignoring case and disabled rows.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|h| h.enabled && h.name.eq_ignore_ascii_case(name))
    }

    /// Checks if the request has a non-empty body.
    pub fn has_body(&self) -> bool {
        self.body.as_ref().map_or(false, |b| !b.content.is_empty())
    }
}
