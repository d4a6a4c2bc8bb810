//! End-to-end collection run tests against a local mock server.

use collection_runner::auth::AuthConfig;
use collection_runner::executor::ExecutionConfig;
use collection_runner::models::{
    Collection, Folder, HttpMethod, RequestDefinition, RunRequest, RunStatus,
};
use collection_runner::runner::CollectionRunner;
use collection_runner::script::ScriptConfig;
use collection_runner::store::{
    InMemoryCollectionStore, InMemoryHistorySink, InMemoryRunStore, InMemoryVariableStore,
    Variable,
};
use httpmock::prelude::*;
use std::sync::Arc;

const TEAM: &str = "team-1";
const USER: &str = "user-1";

fn runner_for(collection: Collection, variables: InMemoryVariableStore) -> CollectionRunner {
    let _ = env_logger::builder().is_test(true).try_init();
    let collections = InMemoryCollectionStore::new();
    collections.put(collection);
    CollectionRunner::new(
        Arc::new(collections),
        Arc::new(variables),
        Arc::new(InMemoryHistorySink::new()),
        Arc::new(InMemoryRunStore::new()),
        ExecutionConfig::default(),
        ScriptConfig::default(),
    )
}

fn request_to(server: &MockServer, id: &str, name: &str, path: &str) -> RequestDefinition {
    RequestDefinition::new(id, name, HttpMethod::GET, server.url(path))
}

#[test]
fn single_request_collection_completes() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/ping");
        then.status(200).body("pong");
    });

    let mut collection = Collection::new("col-1", "Smoke");
    collection.requests = vec![request_to(&server, "r-1", "Ping", "/ping")];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    mock.assert();
    assert_eq!(detail.result.status, RunStatus::Completed);
    assert_eq!(detail.result.total_requests, 1);
    assert_eq!(detail.result.passed_requests, 1);
    assert_eq!(detail.result.failed_requests, 0);
    assert!(detail.result.completed_at.is_some());

    assert_eq!(detail.iterations.len(), 1);
    let iteration = &detail.iterations[0];
    assert_eq!(iteration.response_status, Some(200));
    assert!(iteration.passed);
    assert!(iteration.error_message.is_none());
}

#[test]
fn failing_request_fails_run_but_not_siblings() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ok");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(GET).path("/broken");
        then.status(500);
    });

    let mut collection = Collection::new("col-1", "Mixed");
    let mut ok = request_to(&server, "r-1", "Ok", "/ok");
    ok.sort_order = 0;
    let mut broken = request_to(&server, "r-2", "Broken", "/broken");
    broken.sort_order = 1;
    let mut trailing = request_to(&server, "r-3", "Trailing", "/ok");
    trailing.sort_order = 2;
    collection.requests = vec![ok, broken, trailing];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    // The failed request is recorded and the run continues to the end.
    assert_eq!(detail.result.status, RunStatus::Failed);
    assert_eq!(detail.result.total_requests, 3);
    assert_eq!(detail.result.passed_requests, 2);
    assert_eq!(detail.result.failed_requests, 1);
    assert_eq!(detail.iterations.len(), 3);
    assert!(!detail.iterations[1].passed);
    assert!(detail.iterations[2].passed);
}

#[test]
fn post_response_assertions_are_tallied() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id": 7, "name": "widget"}"#);
    });

    let mut collection = Collection::new("col-1", "Asserted");
    let mut request = request_to(&server, "r-1", "Data", "/data");
    request.post_response_script = Some(
        "pm.test('status is 200', function () { \
             pm.expect(pm.response.code).to.equal(200); \
         }); \
         pm.test('has id', function () { \
             pm.expect(pm.response.json()).to.have.property('id'); \
         }); \
         pm.test('wrong name', function () { \
             pm.expect(pm.response.json().name).to.equal('gadget'); \
         });"
            .to_string(),
    );
    collection.requests = vec![request];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    // Assertion failures do not fail the request; HTTP status decides.
    assert_eq!(detail.result.status, RunStatus::Completed);
    assert_eq!(detail.result.total_assertions, 3);
    assert_eq!(detail.result.passed_assertions, 2);
    assert_eq!(detail.result.failed_assertions, 1);

    let failed = detail.iterations[0]
        .assertion_results
        .iter()
        .find(|a| !a.passed)
        .unwrap();
    assert_eq!(failed.name, "wrong name");
    assert!(failed.message.as_ref().unwrap().contains("gadget"));
}

#[test]
fn collection_auth_is_inherited_by_requests() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/secure")
            .header("Authorization", "Bearer inherited-token");
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Secured");
    collection.auth = Some(AuthConfig::Bearer {
        token: "inherited-token".to_string(),
    });
    collection.requests = vec![request_to(&server, "r-1", "Secure", "/secure")];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    mock.assert();
    assert_eq!(detail.result.status, RunStatus::Completed);
}

#[test]
fn environment_variables_resolve_in_request_urls() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/staging/health");
        then.status(200);
    });

    let variables = InMemoryVariableStore::new();
    variables.add_environment("env-1", Variable::new("stage", "staging"));

    let mut collection = Collection::new("col-1", "Env");
    collection.requests = vec![RequestDefinition::new(
        "r-1",
        "Health",
        HttpMethod::GET,
        format!("{}/{{{{stage}}}}/health", server.base_url()),
    )];
    let runner = runner_for(collection, variables);

    let mut run_request = RunRequest::new("col-1");
    run_request.environment_id = Some("env-1".to_string());

    let detail = runner.start_run(&run_request, TEAM, USER).unwrap();

    mock.assert();
    assert_eq!(detail.result.status, RunStatus::Completed);
}

#[test]
fn data_rows_drive_templated_requests() {
    let server = MockServer::start();
    let alice = server.mock(|when, then| {
        when.method(GET).path("/users/alice");
        then.status(200);
    });
    let bob = server.mock(|when, then| {
        when.method(GET).path("/users/bob");
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Data Driven");
    collection.requests = vec![RequestDefinition::new(
        "r-1",
        "User Lookup",
        HttpMethod::GET,
        format!("{}/users/{{{{username}}}}", server.base_url()),
    )];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let mut run_request = RunRequest::new("col-1");
    run_request.iteration_count = 2;
    run_request.data_filename = Some("users.csv".to_string());
    run_request.data_file_content = Some("username\nalice\nbob\n".to_string());

    let detail = runner.start_run(&run_request, TEAM, USER).unwrap();

    alice.assert();
    bob.assert();
    assert_eq!(detail.result.status, RunStatus::Completed);
    assert_eq!(detail.result.total_requests, 2);
}

#[test]
fn script_set_variable_feeds_next_request_url() {
    let server = MockServer::start();
    let seed = server.mock(|when, then| {
        when.method(GET).path("/seed");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"next": "chained"}"#);
    });
    let chained = server.mock(|when, then| {
        when.method(GET).path("/chained");
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Chained");
    let mut first = request_to(&server, "r-1", "Seed", "/seed");
    first.sort_order = 0;
    first.post_response_script = Some(
        "pm.variables.set('nextPath', pm.response.json().next);".to_string(),
    );
    let mut second = RequestDefinition::new(
        "r-2",
        "Follow",
        HttpMethod::GET,
        format!("{}/{{{{nextPath}}}}", server.base_url()),
    );
    second.sort_order = 1;
    collection.requests = vec![first, second];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    seed.assert();
    chained.assert();
    assert_eq!(detail.result.status, RunStatus::Completed);
    assert_eq!(detail.result.passed_requests, 2);
}

#[test]
fn folder_tree_executes_depth_first() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Tree");
    let alpha = Folder::new("f-alpha", "Alpha", 0);
    let beta = Folder::new("f-beta", "Beta", 1);
    collection.folders = vec![alpha, beta];

    let mut in_alpha = request_to(&server, "r-a", "In Alpha", "/alpha");
    in_alpha.folder_id = Some("f-alpha".to_string());
    let mut in_beta = request_to(&server, "r-b", "In Beta", "/beta");
    in_beta.folder_id = Some("f-beta".to_string());
    collection.requests = vec![in_beta, in_alpha];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    let names: Vec<&str> = detail
        .iterations
        .iter()
        .map(|i| i.request_name.as_str())
        .collect();
    assert_eq!(names, vec!["In Alpha", "In Beta"]);
}

#[test]
fn cancelling_pre_request_script_skips_http_call() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/never");
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Guarded");
    let mut request = request_to(&server, "r-1", "Never", "/never");
    request.pre_request_script = Some("pm.request.cancel();".to_string());
    collection.requests = vec![request];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    // Zero calls reached the server.
    assert_eq!(mock.hits(), 0);
    assert!(detail.iterations[0]
        .error_message
        .as_ref()
        .unwrap()
        .contains("Skipped"));
}

#[test]
fn network_failure_is_recorded_and_run_continues() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/alive");
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Flaky");
    let mut dead = RequestDefinition::new(
        "r-1",
        "Dead",
        HttpMethod::GET,
        "http://127.0.0.1:1/unreachable",
    );
    dead.sort_order = 0;
    let mut alive = request_to(&server, "r-2", "Alive", "/alive");
    alive.sort_order = 1;
    collection.requests = vec![dead, alive];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let detail = runner
        .start_run(&RunRequest::new("col-1"), TEAM, USER)
        .unwrap();

    assert_eq!(detail.result.status, RunStatus::Failed);
    assert_eq!(detail.result.total_requests, 2);
    assert_eq!(detail.result.passed_requests, 1);

    let failed = &detail.iterations[0];
    assert_eq!(failed.response_status, Some(0));
    assert!(failed.error_message.is_some());
}

#[test]
fn multiple_iterations_repeat_every_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/ping");
        then.status(200);
    });

    let mut collection = Collection::new("col-1", "Repeat");
    collection.requests = vec![request_to(&server, "r-1", "Ping", "/ping")];
    let runner = runner_for(collection, InMemoryVariableStore::new());

    let mut run_request = RunRequest::new("col-1");
    run_request.iteration_count = 3;

    let detail = runner.start_run(&run_request, TEAM, USER).unwrap();

    assert_eq!(mock.hits(), 3);
    assert_eq!(detail.result.total_requests, 3);
    assert_eq!(detail.iterations.len(), 3);
    let iteration_numbers: Vec<u32> = detail
        .iterations
        .iter()
        .map(|i| i.iteration_number)
        .collect();
    assert_eq!(iteration_numbers, vec![1, 2, 3]);
}
