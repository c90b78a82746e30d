//! One-shot reads and probing against a mock config server.

#![cfg(feature = "reqwest-transport")]

use apollo_watch::core::probe_server_url;
use apollo_watch::prelude::*;
use apollo_watch::transport::ReqwestTransport;
use mockito::Matcher;
use std::time::Duration;

/// A local address nothing listens on.
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn client(server: &mockito::Server) -> ApolloClient {
    ApolloClient::builder()
        .with_server_url(server.url())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_cached_fetch_returns_whole_map() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/configfiles/json/A1/default/application")
        .match_header("Authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"timeout":"30","host":"db.internal"}"#)
        .create_async()
        .await;

    let outcome = client(&server)
        .fetch_one("A1", "application", true, "")
        .await
        .unwrap();

    let config = outcome.config().unwrap();
    assert_eq!(config.get_str("timeout"), Some("30"));
    assert_eq!(config.get_str("host"), Some("db.internal"));
    assert_eq!(config.cluster(), "default");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_uncached_fetch_with_ip_and_release_key() {
    let mut server = mockito::Server::new_async().await;
    let changed = server
        .mock("GET", "/configs/A1/blue/app.yml?ip=10.0.0.7&releaseKey=r1")
        .with_status(200)
        .with_body(
            r#"{"appId":"A1","cluster":"blue","namespaceName":"app.yml","configurations":{"content":"a: 1"},"releaseKey":"r2"}"#,
        )
        .create_async()
        .await;
    let unchanged = server
        .mock("GET", "/configs/A1/blue/app.yml?ip=10.0.0.7&releaseKey=r2")
        .with_status(304)
        .create_async()
        .await;

    let client = ApolloClient::builder()
        .with_server_url(server.url())
        .with_cluster("blue")
        .with_client_ip("10.0.0.7")
        .build()
        .unwrap();

    let outcome = client.fetch_one("A1", "app.yml", false, "r1").await.unwrap();
    let config = outcome.into_config().unwrap();
    assert_eq!(config.release_key(), Some("r2"));
    assert_eq!(config.get_str("content"), Some("a: 1"));

    let outcome = client.fetch_one("A1", "app.yml", false, "r2").await.unwrap();
    assert_eq!(outcome, FetchOutcome::NotModified);

    changed.assert_async().await;
    unchanged.assert_async().await;
}

#[tokio::test]
async fn test_error_status_keeps_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/configfiles/json/A1/default/missing")
        .with_status(404)
        .with_body("namespace not found")
        .create_async()
        .await;

    let result = client(&server).fetch_one("A1", "missing", true, "").await;
    match result {
        Err(ApolloError::UnexpectedStatus { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "namespace not found");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_signed_requests_per_app() {
    let mut server = mockito::Server::new_async().await;
    let signed = server
        .mock("GET", "/configfiles/json/A1/default/application")
        .match_header(
            "Authorization",
            Matcher::Regex(r"^Apollo A1:[A-Za-z0-9+/]{27}=$".to_string()),
        )
        .match_header("Timestamp", Matcher::Regex(r"^\d{13}$".to_string()))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let unsigned = server
        .mock("GET", "/configfiles/json/A2/default/application")
        .match_header("Authorization", Matcher::Missing)
        .match_header("Timestamp", Matcher::Missing)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = ApolloClient::builder()
        .with_server_url(server.url())
        .with_app_secret("A1", "s3cr3t")
        .build()
        .unwrap();

    client.fetch_one("A1", "application", true, "").await.unwrap();
    client.fetch_one("A2", "application", true, "").await.unwrap();

    signed.assert_async().await;
    unsigned.assert_async().await;
}

#[tokio::test]
async fn test_fetch_many_reports_each_namespace() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/configfiles/json/A1/default/application")
        .with_status(200)
        .with_body(r#"{"k":"v"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/configfiles/json/A1/default/broken")
        .with_status(500)
        .create_async()
        .await;

    let results = client(&server)
        .fetch_many(
            &[
                FetchRequest::new("A1", "broken"),
                FetchRequest::new("A1", "application"),
            ],
            true,
        )
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].namespace, "broken");
    assert!(results[0].outcome.is_err());
    assert_eq!(results[1].namespace, "application");
    assert!(results[1].outcome.is_ok());
}

#[tokio::test]
async fn test_probe_config_server_root() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(404)
        .with_body(
            r#"{"timestamp":"2024-05-01T10:00:00.000+0000","status":404,"error":"Not Found","path":"/"}"#,
        )
        .create_async()
        .await;

    client(&server).probe().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_probe_rejects_other_servers() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html>welcome</html>")
        .create_async()
        .await;

    let transport = ReqwestTransport::builder().build().unwrap();
    let result = probe_server_url(&transport, &server.url(), Duration::from_secs(5)).await;
    assert!(matches!(result, Err(ApolloError::ProbeFailed(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let client = ApolloClient::builder()
        .with_server_url(closed_port_url())
        .with_fetch_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let result = client.fetch_one("A1", "application", true, "").await;
    assert!(matches!(
        result,
        Err(ApolloError::Transport(_) | ApolloError::Timeout(_))
    ));
}
