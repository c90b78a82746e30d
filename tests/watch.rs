//! Long-poll watching against a mock config server.

#![cfg(feature = "reqwest-transport")]

use apollo_watch::prelude::*;
use mockito::Matcher;
use std::time::Duration;
use tokio::sync::mpsc;

/// A local address nothing listens on.
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn notifications(app_id: &str, payload: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("appId".into(), app_id.into()),
        Matcher::UrlEncoded("cluster".into(), "default".into()),
        Matcher::UrlEncoded("notifications".into(), payload.into()),
    ])
}

#[derive(Debug)]
struct Seen {
    namespace: String,
    old: Option<i64>,
    new: i64,
    content: Option<String>,
}

#[tokio::test]
async fn test_first_change_fetches_and_notifies() {
    let mut server = mockito::Server::new_async().await;
    let first_poll = server
        .mock("GET", "/notifications/v2")
        .match_query(notifications(
            "A1",
            r#"[{"namespaceName":"app.yml","notificationId":-1}]"#,
        ))
        .with_status(200)
        .with_body(
            r#"[{"namespaceName":"app.yml","notificationId":100,"messages":{"details":{"A1+default+app.yml":100}}}]"#,
        )
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/notifications/v2")
        .match_query(notifications(
            "A1",
            r#"[{"namespaceName":"app.yml","notificationId":100}]"#,
        ))
        .with_status(304)
        .create_async()
        .await;
    let fetch = server
        .mock("GET", "/configs/A1/default/app.yml")
        .with_status(200)
        .with_body(
            r#"{"appId":"A1","cluster":"default","namespaceName":"app.yml","configurations":{"content":"port: 8080"},"releaseKey":"20240501-1"}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = ApolloClient::builder()
        .with_server_url(server.url())
        .build()
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client
        .watcher()
        .app("A1", [("app.yml", -1)])
        .on_change(move |change| {
            let _ = tx.send(Seen {
                namespace: change.namespace.clone(),
                old: change.old_notification_id,
                new: change.new_notification_id,
                content: change
                    .new_config()
                    .and_then(|c| c.get_str("content"))
                    .map(str::to_string),
            });
        })
        .spawn();

    let seen = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.namespace, "app.yml");
    assert_eq!(seen.old, Some(-1));
    assert_eq!(seen.new, 100);
    assert_eq!(seen.content.as_deref(), Some("port: 8080"));

    let stored = handle.snapshot().get("A1", "app.yml").unwrap();
    assert_eq!(stored.release_key(), Some("20240501-1"));

    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap();

    first_poll.assert_async().await;
    fetch.assert_async().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unreachable_server_triggers_failure_storm() {
    let client = ApolloClient::builder()
        .with_server_url(closed_port_url())
        .with_long_poll_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let handle = client
        .watcher()
        .app_namespaces("A1", ["application"])
        .app_namespaces("A2", ["application"])
        .spawn();

    let result = tokio::time::timeout(Duration::from_secs(30), handle.wait())
        .await
        .unwrap();
    match result {
        Err(ApolloError::FailureStorm {
            failures,
            distinct_instants,
            ..
        }) => {
            assert_eq!(failures, 5);
            assert!(distinct_instants <= 2);
        }
        other => panic!("expected FailureStorm, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_do_not_touch_state() {
    let mut server = mockito::Server::new_async().await;
    let errors = server
        .mock("GET", "/notifications/v2")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .expect_at_least(5)
        .create_async()
        .await;

    let client = ApolloClient::builder()
        .with_server_url(server.url())
        .build()
        .unwrap();

    let mut poll = client.poll_loop(
        "A1",
        NotificationState::with_namespaces(["application"]),
        Listeners::new(),
    );

    let mut storm = None;
    for _ in 0..5 {
        if let Err(err) = poll.cycle().await {
            storm = Some(err);
            break;
        }
        assert_eq!(poll.state().get("application"), Some(-1));
    }

    assert!(matches!(storm, Some(ApolloError::FailureStorm { .. })));
    errors.assert_async().await;
}
