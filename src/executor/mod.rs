//! HTTP request executor.
//!
//! The executor turns a [`ProxyRequest`] into a [`ProxyResponse`]: it
//! resolves variables in the URL, headers, and body, applies the resolved
//! authentication, sends the call with redirects followed manually (so every
//! visited location is captured), and optionally persists a history record.
//!
//! Failures are data: network errors and timeouts produce a synthetic
//! response with status 0 and a descriptive status text instead of an error,
//! so a batch run can record the outcome and keep going.

pub mod config;
pub mod error;
pub mod status;

pub use config::{ExecutionConfig, DEFAULT_TIMEOUT_SECS, MAX_REDIRECT_COUNT};
pub use error::RequestError;
pub use status::status_text_for;

use crate::auth::{resolve_auth, AuthConfig};
use crate::history::HistoryEntry;
use crate::models::{Collection, HttpMethod, ProxyRequest, ProxyResponse, RequestDefinition};
use crate::store::{HistorySink, VariableStore};
use crate::variables::{substitute, VariableResolver};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// HTTP statuses treated as redirects by the manual redirect loop.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// A request after variable and auth resolution, ready to send.
struct ResolvedCall {
    method: HttpMethod,
    url: String,
    headers: HashMap<String, String>,
    body: Option<String>,
    follow_redirects: bool,
    timeout: Duration,
}

/// Executes HTTP requests against resolved variables and authentication.
pub struct RequestExecutor {
    variables: Arc<dyn VariableStore>,
    history: Arc<dyn HistorySink>,
    config: ExecutionConfig,
}

impl RequestExecutor {
    /// Creates an executor over the given variable store and history sink.
    pub fn new(
        variables: Arc<dyn VariableStore>,
        history: Arc<dyn HistorySink>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            variables,
            history,
            config,
        }
    }

    /// Executes one HTTP request and returns the final response.
    ///
    /// This is the main entry point. It resolves the URL, headers, body, and
    /// auth against the request's variable scopes (plus the caller-supplied
    /// local overlay), sends the call following redirects manually, and,
    /// when `save_to_history` is set, persists a history record and stamps
    /// its id onto the response.
    ///
    /// Never fails: network-level problems yield a synthetic response with
    /// `status_code` 0 and a descriptive `status_text`.
    ///
    /// # Arguments
    ///
    /// * `request` - The request to execute
    /// * `team_id` - Team whose global variables apply
    /// * `user_id` - Executing user, recorded on history entries
    /// * `local_vars` - Run-scoped variable overlay, if any
    pub fn execute_request(
        &self,
        request: &ProxyRequest,
        team_id: &str,
        user_id: &str,
        local_vars: Option<&HashMap<String, String>>,
    ) -> ProxyResponse {
        let call = match self.resolve_call(request, team_id, local_vars) {
            Ok(call) => call,
            Err(err) => return failure_response(err),
        };

        log::debug!("{} {}", call.method, call.url);

        let mut response = match self.send_with_redirects(&call) {
            Ok(response) => response,
            Err(err) => failure_response(err),
        };

        if request.save_to_history {
            self.persist_history(user_id, &call, &mut response);
        }

        response
    }

    /// Resolves variables and authentication into a sendable call.
    fn resolve_call(
        &self,
        request: &ProxyRequest,
        team_id: &str,
        local_vars: Option<&HashMap<String, String>>,
    ) -> Result<ResolvedCall, RequestError> {
        let resolver = VariableResolver::new(self.variables.as_ref());
        let variables = resolver.build_variable_map(
            team_id,
            request.collection_id.as_deref(),
            request.environment_id.as_deref(),
            local_vars,
        );

        let url = substitute(&request.url, &variables);
        let mut parsed = validate_url(&url)?;

        let auth = resolve_auth(request.auth.as_ref(), &variables);

        // Declared headers first, then the Content-Type implied by the body
        // type if not already present, then auth headers last so neither
        // Content-Type nor auth silently disappears.
        let mut headers: HashMap<String, String> = request
            .headers
            .iter()
            .filter(|h| h.enabled)
            .map(|h| (substitute(&h.name, &variables), substitute(&h.value, &variables)))
            .collect();

        if let Some(body) = &request.body {
            let has_content_type = headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case("content-type"));
            if !has_content_type {
                headers.insert(
                    "Content-Type".to_string(),
                    body.body_type.content_type().to_string(),
                );
            }
        }

        for (name, value) in &auth.headers {
            set_header(&mut headers, name, value);
        }

        if !auth.query_params.is_empty() {
            let mut pairs = parsed.query_pairs_mut();
            for (key, value) in &auth.query_params {
                pairs.append_pair(key, value);
            }
        }

        let body = request
            .body
            .as_ref()
            .map(|b| substitute(&b.content, &variables));

        let timeout = Duration::from_secs(
            request.timeout_secs.unwrap_or(self.config.timeout_secs),
        );

        Ok(ResolvedCall {
            method: request.method,
            url: parsed.to_string(),
            headers,
            body,
            follow_redirects: request.follow_redirects,
            timeout,
        })
    }

    /// Sends the resolved call, following redirects manually.
    ///
    /// Each redirect's target location is appended to the response's
    /// `redirect_chain`. When the configured cap is reached and the server
    /// still redirects, the last response is returned with its status text
    /// replaced by `"Max redirects exceeded"`; this is not an error.
    fn send_with_redirects(&self, call: &ResolvedCall) -> Result<ProxyResponse, RequestError> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(call.timeout)
            .build()?;

        let started = Instant::now();
        let mut method = call.method;
        let mut url = call.url.clone();
        let mut body = call.body.clone();
        let mut chain: Vec<String> = Vec::new();

        loop {
            let mut response = self.send_once(&client, method, &url, &call.headers, &body)?;
            response.redirect_chain = chain.clone();
            response.response_time_ms = started.elapsed().as_millis() as u64;

            let location = response.header("Location").map(str::to_string);
            let is_redirect = REDIRECT_STATUSES.contains(&response.status_code);

            if !call.follow_redirects || !is_redirect {
                return Ok(response);
            }

            let location = match location {
                Some(location) => location,
                None => return Ok(response),
            };

            if chain.len() as u32 >= self.config.max_redirects {
                response.status_text = "Max redirects exceeded".to_string();
                return Ok(response);
            }

            let next = url::Url::parse(&url)?.join(&location)?.to_string();
            chain.push(next.clone());

            // 303 tells the client to fetch the new location with GET.
            if response.status_code == 303 {
                method = HttpMethod::GET;
                body = None;
            }

            url = next;
        }
    }

    /// Sends one HTTP call and converts the raw response.
    fn send_once(
        &self,
        client: &reqwest::blocking::Client,
        method: HttpMethod,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Option<String>,
    ) -> Result<ProxyResponse, RequestError> {
        let mut builder = client.request(to_reqwest_method(method), url);

        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = body {
            builder = builder.body(body.clone());
        }

        let raw = builder.send()?;

        let status_code = raw.status().as_u16();
        let mut response = ProxyResponse::new(status_code, status_text_for(status_code));

        for (name, value) in raw.headers() {
            if let Ok(value) = value.to_str() {
                response
                    .headers
                    .insert(name.as_str().to_string(), value.to_string());
            }
        }

        response.content_type = response.header("Content-Type").map(str::to_string);
        response.body = raw.text().map_err(RequestError::from)?;

        let headers_size: usize = response
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len() + 4)
            .sum();
        response.size_bytes = headers_size + response.body.len();

        Ok(response)
    }

    /// Persists a history record for the executed call and stamps its id on
    /// the response. Sink failures are logged and leave `history_id` unset.
    fn persist_history(&self, user_id: &str, call: &ResolvedCall, response: &mut ProxyResponse) {
        let mut entry = HistoryEntry::new(user_id);
        entry.request_method = call.method.to_string();
        entry.request_url = call.url.clone();
        entry.request_headers = call.headers.clone();
        entry.request_body = call.body.clone();
        entry.status_code = response.status_code;
        entry.status_text = response.status_text.clone();
        entry.response_headers = response.headers.clone();
        entry.response_body = response.body.clone();
        entry.duration_ms = response.response_time_ms;
        entry.size_bytes = response.size_bytes;

        match self.history.save(&entry) {
            Ok(id) => response.history_id = Some(id),
            Err(err) => log::warn!("failed to persist history record: {}", err),
        }
    }
}

/// Walks the auth inheritance chain for a stored request.
///
/// Checks the request itself, then its folder and ancestor folders nearest
/// first, then the collection; the first configuration that is not
/// `Inherit` wins. Falls back to `NoAuth` when the whole chain is silent.
pub fn resolve_inherited_auth(
    collection: &Collection,
    request: &RequestDefinition,
) -> AuthConfig {
    if let Some(auth) = &request.auth {
        if !auth.is_inherit() {
            return auth.clone();
        }
    }

    let mut folder_id = request.folder_id.as_deref();
    while let Some(id) = folder_id {
        match collection.folder(id) {
            Some(folder) => {
                if let Some(auth) = &folder.auth {
                    if !auth.is_inherit() {
                        return auth.clone();
                    }
                }
                folder_id = folder.parent_id.as_deref();
            }
            None => break,
        }
    }

    if let Some(auth) = &collection.auth {
        if !auth.is_inherit() {
            return auth.clone();
        }
    }

    AuthConfig::NoAuth
}

/// Builds the synthetic response for a failed call.
fn failure_response(err: RequestError) -> ProxyResponse {
    match err {
        RequestError::Timeout => ProxyResponse::network_failure("Request timed out"),
        other => ProxyResponse::network_failure(other.to_string()),
    }
}

/// Replaces a header, removing any existing entry with the same name
/// regardless of case before inserting.
fn set_header(headers: &mut HashMap<String, String>, name: &str, value: &str) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

/// Validates that the URL is well-formed and uses a supported protocol.
fn validate_url(url: &str) -> Result<url::Url, RequestError> {
    let parsed = url::Url::parse(url)?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(RequestError::UnsupportedProtocol(format!(
            "Only HTTP and HTTPS are supported, got: {}",
            scheme
        )));
    }

    Ok(parsed)
}

/// Converts our HttpMethod to reqwest's Method.
fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        HttpMethod::HEAD => reqwest::Method::HEAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::RequestBody;
    use crate::models::Folder;
    use crate::store::{InMemoryHistorySink, InMemoryVariableStore, Variable};

    fn executor_with(store: InMemoryVariableStore) -> RequestExecutor {
        RequestExecutor::new(
            Arc::new(store),
            Arc::new(InMemoryHistorySink::new()),
            ExecutionConfig::default(),
        )
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/path?q=1").is_ok());
        assert!(validate_url("not a url").is_err());
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(RequestError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_resolve_call_substitutes_url_and_headers() {
        let store = InMemoryVariableStore::new();
        store.add_global("team-1", Variable::new("host", "api.example.com"));
        store.add_global("team-1", Variable::new("token", "t-1"));
        let executor = executor_with(store);

        let mut request = ProxyRequest::new(HttpMethod::GET, "https://{{host}}/users");
        request.add_header("X-Token", "{{token}}");

        let call = executor.resolve_call(&request, "team-1", None).unwrap();
        assert_eq!(call.url, "https://api.example.com/users");
        assert_eq!(call.headers.get("X-Token").map(String::as_str), Some("t-1"));
    }

    #[test]
    fn test_resolve_call_implies_content_type_from_body() {
        let executor = executor_with(InMemoryVariableStore::new());

        let mut request = ProxyRequest::new(HttpMethod::POST, "https://example.com");
        request.body = Some(RequestBody::json("{}"));

        let call = executor.resolve_call(&request, "team-1", None).unwrap();
        assert_eq!(
            call.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_resolve_call_keeps_declared_content_type() {
        let executor = executor_with(InMemoryVariableStore::new());

        let mut request = ProxyRequest::new(HttpMethod::POST, "https://example.com");
        request.add_header("content-type", "application/vnd.api+json");
        request.body = Some(RequestBody::json("{}"));

        let call = executor.resolve_call(&request, "team-1", None).unwrap();
        assert_eq!(call.headers.len(), 1);
        assert_eq!(
            call.headers.get("content-type").map(String::as_str),
            Some("application/vnd.api+json")
        );
    }

    #[test]
    fn test_resolve_call_auth_header_wins_over_declared() {
        let executor = executor_with(InMemoryVariableStore::new());

        let mut request = ProxyRequest::new(HttpMethod::GET, "https://example.com");
        request.add_header("authorization", "Bearer stale");
        request.auth = Some(AuthConfig::Bearer {
            token: "fresh".to_string(),
        });

        let call = executor.resolve_call(&request, "team-1", None).unwrap();
        assert_eq!(call.headers.len(), 1);
        assert_eq!(
            call.headers.get("Authorization").map(String::as_str),
            Some("Bearer fresh")
        );
    }

    #[test]
    fn test_resolve_call_api_key_query_param() {
        let executor = executor_with(InMemoryVariableStore::new());

        let mut request = ProxyRequest::new(HttpMethod::GET, "https://example.com/search?q=1");
        request.auth = Some(AuthConfig::ApiKey {
            key: "api_key".to_string(),
            value: "k-9".to_string(),
            target: crate::auth::ApiKeyTarget::Query,
        });

        let call = executor.resolve_call(&request, "team-1", None).unwrap();
        assert!(call.url.contains("q=1"));
        assert!(call.url.contains("api_key=k-9"));
    }

    #[test]
    fn test_failure_response_timeout_text() {
        let response = failure_response(RequestError::Timeout);
        assert_eq!(response.status_code, 0);
        assert!(response.status_text.contains("timed out"));
    }

    #[test]
    fn test_resolve_inherited_auth_prefers_request() {
        let mut collection = Collection::new("col-1", "c");
        collection.auth = Some(AuthConfig::Bearer {
            token: "collection".to_string(),
        });

        let mut request =
            RequestDefinition::new("r-1", "R", HttpMethod::GET, "https://x/");
        request.auth = Some(AuthConfig::Bearer {
            token: "own".to_string(),
        });
        collection.requests.push(request.clone());

        let auth = resolve_inherited_auth(&collection, &request);
        assert_eq!(
            auth,
            AuthConfig::Bearer {
                token: "own".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_inherited_auth_walks_folders_nearest_first() {
        let mut collection = Collection::new("col-1", "c");
        collection.auth = Some(AuthConfig::Bearer {
            token: "collection".to_string(),
        });

        let mut outer = Folder::new("f-outer", "Outer", 0);
        outer.auth = Some(AuthConfig::Bearer {
            token: "outer".to_string(),
        });
        let mut inner = Folder::new("f-inner", "Inner", 0);
        inner.parent_id = Some("f-outer".to_string());
        inner.auth = Some(AuthConfig::Inherit);
        collection.folders = vec![outer, inner];

        let mut request =
            RequestDefinition::new("r-1", "R", HttpMethod::GET, "https://x/");
        request.folder_id = Some("f-inner".to_string());
        request.auth = Some(AuthConfig::Inherit);
        collection.requests.push(request.clone());

        // Inner folder inherits, so the outer folder's auth wins over the
        // collection's.
        let auth = resolve_inherited_auth(&collection, &request);
        assert_eq!(
            auth,
            AuthConfig::Bearer {
                token: "outer".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_inherited_auth_falls_back_to_collection_then_noauth() {
        let mut collection = Collection::new("col-1", "c");
        collection.auth = Some(AuthConfig::Basic {
            username: "u".to_string(),
            password: "p".to_string(),
        });

        let request = RequestDefinition::new("r-1", "R", HttpMethod::GET, "https://x/");
        collection.requests.push(request.clone());

        let auth = resolve_inherited_auth(&collection, &request);
        assert!(matches!(auth, AuthConfig::Basic { .. }));

        let bare = Collection::new("col-2", "bare");
        let orphan = RequestDefinition::new("r-2", "R2", HttpMethod::GET, "https://x/");
        assert_eq!(resolve_inherited_auth(&bare, &orphan), AuthConfig::NoAuth);
    }
}
