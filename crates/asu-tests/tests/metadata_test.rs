//! End-to-end tests for the metadata routes and endpoint handling
//!
//! Run with: cargo test -p asu-tests --test metadata_test

use asu_client::testing::{MockBuildServer, TestServer};
use asu_client::{AsuClient, AsuClientError};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn static_overview_reads_latest_json_document() {
    let mock = MockBuildServer::new();
    let server = TestServer::start(mock.router()).await.unwrap();

    let overview = server.client.overview().await.unwrap();

    // The static document lives outside the API routing.
    let received = mock.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, "GET");
    assert_eq!(received[0].path, "/json/v1/latest.json");

    assert!(overview.latest.contains(&"SNAPSHOT".to_string()));
    assert!(overview.branches.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn live_overview_reads_api_route() {
    let mock = MockBuildServer::new();
    let server = TestServer::start(mock.router()).await.unwrap();

    let overview = server.client.overview_live().await.unwrap();

    let received = mock.received();
    assert_eq!(received[0].path, "/api/v1/overview");

    assert!(overview.latest.contains(&"SNAPSHOT".to_string()));
    assert!(!overview.branches.is_empty());
    let snapshot = &overview.branches["SNAPSHOT"];
    assert_eq!(snapshot.snapshot, Some(true));
    assert!(snapshot.targets.contains_key("bcm27xx/bcm2711"));

    server.shutdown().await;
}

#[tokio::test]
async fn revision_returns_build_revision_for_target() {
    let mock = MockBuildServer::new();
    let server = TestServer::start(mock.router()).await.unwrap();

    let info = server
        .client
        .revision("SNAPSHOT", "bcm27xx", "bcm2711")
        .await
        .unwrap();

    assert!(!info.revision.is_empty());
    let received = mock.received();
    assert_eq!(
        received[0].path,
        "/api/v1/revision/SNAPSHOT/bcm27xx/bcm2711"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn metadata_error_surfaces_status_and_detail() {
    let mock = MockBuildServer::new();
    mock.set_revision(json!({
        "status": 404,
        "detail": "unsupported target: bcm27xx/bcm9999",
    }));
    let server = TestServer::start(mock.router()).await.unwrap();

    let err = server
        .client
        .revision("SNAPSHOT", "bcm27xx", "bcm9999")
        .await
        .unwrap_err();

    match err {
        AsuClientError::ServerError { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "unsupported target: bcm27xx/bcm9999");
        }
        other => panic!("expected server error, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn set_endpoint_repoints_an_existing_client() {
    let mock = MockBuildServer::new();
    let server = TestServer::start(mock.router()).await.unwrap();

    // A client created against some other server, repointed at the mock.
    let mut client = AsuClient::with_endpoint("http://localhost:9/api/v1/").unwrap();
    let updated = client.set_endpoint(&server.endpoint()).unwrap().to_string();
    assert_eq!(updated, server.endpoint());
    assert_eq!(client.endpoint().as_str(), server.endpoint());

    let overview = client.overview_live().await.unwrap();
    assert!(overview.latest.contains(&"SNAPSHOT".to_string()));

    server.shutdown().await;
}

#[tokio::test]
async fn clients_with_different_endpoints_coexist() {
    let first_mock = MockBuildServer::new();
    first_mock.set_latest(json!({"latest": ["23.05.5"]}));
    let first = TestServer::start(first_mock.router()).await.unwrap();

    let second_mock = MockBuildServer::new();
    second_mock.set_latest(json!({"latest": ["24.10.0", "SNAPSHOT"]}));
    let second = TestServer::start(second_mock.router()).await.unwrap();

    // Per-handle endpoints: neither client disturbs the other.
    let first_latest = first.client.overview().await.unwrap().latest;
    let second_latest = second.client.overview().await.unwrap().latest;
    assert_eq!(first_latest, vec!["23.05.5".to_string()]);
    assert_eq!(
        second_latest,
        vec!["24.10.0".to_string(), "SNAPSHOT".to_string()]
    );

    first.shutdown().await;
    second.shutdown().await;
}
