//! Store Recovery Tests
//!
//! A store failure during a request must replace the handle exactly once
//! (close old, open new, re-prepare the catalog) before the failed request
//! is answered with 500. The next request runs on the new handle.

mod common;

use std::fs;
use std::time::Duration;

use axum::http::StatusCode;

use common::{post_row, posts, Harness};
use restgres::catalog::{names, QueryCatalog};
use restgres::config::ServiceConfig;
use restgres::dispatch::INTERNAL_ERROR_BODY;
use restgres::resilience::ConnectionState;
use restgres::store::MemoryConnector;

// =============================================================================
// ONE RECONNECTION CYCLE
// =============================================================================

/// Test: A broken handle during `/api/posts` yields one cycle and a 500;
/// the following request succeeds on the new handle.
#[tokio::test]
async fn test_failure_triggers_single_reconnect() {
    let connector = MemoryConnector::new()
        .with_fixture(names::ALL_POSTS, posts(vec![post_row(1, "Hello", "article")]));
    let harness = Harness::new(connector).await;
    let catalog_size = QueryCatalog::content().len();

    assert_eq!(harness.connector.connects(), 1);
    assert_eq!(harness.connector.prepared_on(1), catalog_size);

    harness.connector.break_connections();

    let failed = harness.get("/api/posts").await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.text(), INTERNAL_ERROR_BODY);

    // one close, one open, full catalog on the new handle
    assert_eq!(harness.connector.closed(), vec![1]);
    assert_eq!(harness.connector.connects(), 2);
    assert_eq!(harness.connector.prepared_on(2), catalog_size);
    assert_eq!(harness.service.store().reconnects(), 1);

    // the failed request is not retried
    let executions = harness.connector.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].generation, 1);

    let next = harness.get("/api/posts").await;
    assert_eq!(next.status, StatusCode::OK);
    assert_eq!(next.json()["postTitle"], "Hello");

    let executions = harness.connector.executions();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[1].generation, 2);
    assert_eq!(harness.connector.connects(), 2);

    let slot = harness.service.store().lock().await;
    assert_eq!(slot.state(), ConnectionState::Connected);
}

/// Test: Recovery reads the connection string from the file again.
#[tokio::test]
async fn test_reconnect_rereads_connection_string() {
    let harness = Harness::new(MemoryConnector::new()).await;

    let mut updated = ServiceConfig::read(&harness.config_path).unwrap();
    updated.db_conn_string = "host=replica dbname=site".to_string();
    updated.write(&harness.config_path).unwrap();

    harness.connector.break_connections();
    harness.get("/api/articles").await;

    assert_eq!(
        harness.connector.connect_strings(),
        vec!["host=memory dbname=site", "host=replica dbname=site"]
    );
}

/// Test: An unreadable config during recovery falls back to the cached string.
#[tokio::test]
async fn test_reconnect_survives_broken_config_file() {
    let harness = Harness::new(MemoryConnector::new()).await;

    fs::write(&harness.config_path, "{ truncated").unwrap();
    harness.connector.break_connections();

    let failed = harness.get("/api/projects").await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        harness.connector.connect_strings().last().unwrap(),
        "host=memory dbname=site"
    );
    assert_eq!(harness.get("/api/projects").await.status, StatusCode::OK);
}

/// Test: A transient refusal is absorbed by the retry schedule.
#[tokio::test]
async fn test_reconnect_retries_refused_connects() {
    let harness = Harness::new(MemoryConnector::new()).await;

    harness.connector.break_connections();
    harness.connector.refuse_connects(2);

    let failed = harness.get("/api/posts").await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(harness.service.is_healthy());

    assert_eq!(harness.get("/api/posts").await.status, StatusCode::OK);
}

// =============================================================================
// NO RECONNECT FOR NON-STORE FAILURES
// =============================================================================

/// Test: A marshalling failure is a 500 but leaves the handle alone.
#[tokio::test]
async fn test_marshal_failure_does_not_reconnect() {
    use restgres::store::{Cell, ResultRow, ResultRowSet};

    let clash = ResultRowSet::new(vec![ResultRow::new(vec![
        Cell::text("game_path", "/a"),
        Cell::text("GAME_PATH", "/b"),
    ])]);
    let connector = MemoryConnector::new().with_fixture(names::ALL_ARTICLES, clash);
    let harness = Harness::new(connector).await;

    let reply = harness.get("/api/articles").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.connector.connects(), 1);
    assert!(harness.connector.closed().is_empty());
}

// =============================================================================
// UNRECOVERABLE STORE
// =============================================================================

/// Test: When every attempt fails, the request still gets 500 and the
/// service reports itself unhealthy.
#[tokio::test]
async fn test_exhausted_reconnect_is_fatal() {
    let harness = Harness::new(MemoryConnector::new()).await;

    harness.connector.break_connections();
    harness.connector.refuse_connects(100);

    let reply = harness.get("/api/posts").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!harness.service.is_healthy());

    let slot = harness.service.store().lock().await;
    assert_eq!(slot.state(), ConnectionState::Reconnecting);
    assert!(slot.catalog().is_none());
    drop(slot);

    tokio::time::timeout(Duration::from_secs(1), harness.service.wait_unhealthy())
        .await
        .expect("unhealthy signal");
}

/// Test: Requests after an exhausted recovery fail fast with no new attempts.
#[tokio::test]
async fn test_after_exhaustion_requests_fail_without_reconnecting() {
    let harness = Harness::new(MemoryConnector::new()).await;

    harness.connector.break_connections();
    harness.connector.refuse_connects(100);
    harness.get("/api/posts").await;
    let attempts = harness.connector.connect_strings().len();

    for path in ["/api/posts", "/api/projects", "/api/images/1"] {
        let reply = harness.get(path).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR, "{}", path);
        assert_eq!(reply.text(), INTERNAL_ERROR_BODY);
    }
    assert_eq!(harness.connector.connect_strings().len(), attempts);
    assert_eq!(harness.service.store().reconnects(), 0);
}
