//! Integration tests for the request executor against a local mock server.

use collection_runner::auth::AuthConfig;
use collection_runner::executor::{ExecutionConfig, RequestExecutor};
use collection_runner::history::{HISTORY_BODY_TRUNCATE_SIZE, TRUNCATION_MARKER};
use collection_runner::models::{HttpMethod, ProxyRequest, RequestBody};
use collection_runner::store::{InMemoryHistorySink, InMemoryVariableStore, Variable};
use httpmock::prelude::*;
use std::sync::Arc;

const TEAM: &str = "team-1";
const USER: &str = "user-1";

struct Harness {
    executor: RequestExecutor,
    history: Arc<InMemoryHistorySink>,
}

fn harness() -> Harness {
    harness_with_variables(InMemoryVariableStore::new())
}

fn harness_with_variables(variables: InMemoryVariableStore) -> Harness {
    let history = Arc::new(InMemoryHistorySink::new());
    let executor = RequestExecutor::new(
        Arc::new(variables),
        history.clone(),
        ExecutionConfig::default(),
    );
    Harness { executor, history }
}

#[test]
fn simple_get_returns_status_and_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/users");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"users": []}"#);
    });

    let harness = harness();
    let request = ProxyRequest::new(HttpMethod::GET, server.url("/users"));
    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    mock.assert();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.status_text, "OK");
    assert_eq!(response.body, r#"{"users": []}"#);
    assert_eq!(
        response.content_type.as_deref(),
        Some("application/json")
    );
    assert!(response.redirect_chain.is_empty());
    assert!(response.history_id.is_none());
}

#[test]
fn post_sends_body_and_implied_content_type() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/items")
            .header("content-type", "application/json")
            .body(r#"{"name": "widget"}"#);
        then.status(201).body("created");
    });

    let harness = harness();
    let mut request = ProxyRequest::new(HttpMethod::POST, server.url("/items"));
    request.body = Some(RequestBody::json(r#"{"name": "widget"}"#));

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    mock.assert();
    assert_eq!(response.status_code, 201);
    assert_eq!(response.status_text, "Created");
}

#[test]
fn variables_resolve_in_url_and_headers() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/users")
            .header("X-Api-Version", "v2");
        then.status(200);
    });

    let variables = InMemoryVariableStore::new();
    variables.add_global(TEAM, Variable::new("version", "v2"));
    let harness = harness_with_variables(variables);

    let mut request =
        ProxyRequest::new(HttpMethod::GET, format!("{}/{{{{version}}}}/users", server.base_url()));
    request.add_header("X-Api-Version", "{{version}}");

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    mock.assert();
    assert_eq!(response.status_code, 200);
}

#[test]
fn bearer_auth_header_is_sent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/private")
            .header("Authorization", "Bearer tok-123");
        then.status(200);
    });

    let harness = harness();
    let mut request = ProxyRequest::new(HttpMethod::GET, server.url("/private"));
    request.auth = Some(AuthConfig::Bearer {
        token: "tok-123".to_string(),
    });

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    mock.assert();
    assert_eq!(response.status_code, 200);
}

#[test]
fn redirects_are_followed_and_recorded() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(GET).path("/old");
        then.status(302).header("Location", "/new");
    });
    let second = server.mock(|when, then| {
        when.method(GET).path("/new");
        then.status(200).body("landed");
    });

    let harness = harness();
    let request = ProxyRequest::new(HttpMethod::GET, server.url("/old"));
    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    first.assert();
    second.assert();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "landed");
    assert_eq!(response.redirect_chain.len(), 1);
    assert!(response.redirect_chain[0].ends_with("/new"));
}

#[test]
fn redirects_are_not_followed_when_disabled() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/old");
        then.status(302).header("Location", "/new");
    });

    let harness = harness();
    let mut request = ProxyRequest::new(HttpMethod::GET, server.url("/old"));
    request.follow_redirects = false;

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    assert_eq!(response.status_code, 302);
    assert!(response.redirect_chain.is_empty());
}

#[test]
fn redirect_loop_stops_at_cap_with_full_chain() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/loop");
        then.status(302).header("Location", "/loop");
    });

    let harness = harness();
    let request = ProxyRequest::new(HttpMethod::GET, server.url("/loop"));
    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    assert_eq!(response.status_text, "Max redirects exceeded");
    assert_eq!(
        response.redirect_chain.len(),
        ExecutionConfig::default().max_redirects as usize
    );
}

#[test]
fn timeout_becomes_synthetic_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200)
            .delay(std::time::Duration::from_millis(2_500));
    });

    let harness = harness();
    let mut request = ProxyRequest::new(HttpMethod::GET, server.url("/slow"));
    request.timeout_secs = Some(1);

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    assert_eq!(response.status_code, 0);
    assert!(response.status_text.contains("timed out"));
}

#[test]
fn connection_failure_becomes_synthetic_response() {
    let harness = harness();
    // Reserved port with no listener.
    let request = ProxyRequest::new(HttpMethod::GET, "http://127.0.0.1:1/nothing");

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    assert_eq!(response.status_code, 0);
    assert!(!response.is_success());
}

#[test]
fn history_is_persisted_with_truncated_body() {
    let server = MockServer::start();
    let big_body = "x".repeat(HISTORY_BODY_TRUNCATE_SIZE + 1_000);
    server.mock(|when, then| {
        when.method(GET).path("/huge");
        then.status(200).body(&big_body);
    });

    let harness = harness();
    let mut request = ProxyRequest::new(HttpMethod::GET, server.url("/huge"));
    request.save_to_history = true;

    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    // The response itself is untouched; only the stored copy is truncated.
    assert_eq!(response.body.len(), big_body.len());

    let entries = harness.history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(response.history_id.as_deref(), Some(entries[0].id.as_str()));
    assert!(entries[0].response_body.len() < HISTORY_BODY_TRUNCATE_SIZE + 50);
    assert!(entries[0].response_body.contains(TRUNCATION_MARKER));
    assert_eq!(entries[0].user_id, USER);
}

#[test]
fn error_statuses_are_data_not_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing");
        then.status(404).body("nope");
    });

    let harness = harness();
    let request = ProxyRequest::new(HttpMethod::GET, server.url("/missing"));
    let response = harness.executor.execute_request(&request, TEAM, USER, None);

    assert_eq!(response.status_code, 404);
    assert_eq!(response.status_text, "Not Found");
    assert!(!response.is_success());
}
