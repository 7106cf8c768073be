//! GitHub source against a canned local HTTP responder.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use abi_harvest_core::{ArtifactDescriptor, ArtifactSource, GitHubArtifactSource, GitHubConfig};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `responses` in order, one per connection, and records each request head.
async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            seen.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&head).to_string());

            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}"), requests)
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn wire(id: u64, name: &str, created: DateTime<Utc>) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "expired": false,
        "created_at": ts(created),
        "expires_at": ts(created + Duration::days(90)),
        "archive_download_url": format!("https://example.invalid/artifacts/{id}/zip"),
    })
}

fn page(artifacts: Vec<serde_json::Value>) -> String {
    json!({ "total_count": artifacts.len(), "artifacts": artifacts }).to_string()
}

fn source(api_base: &str, page_size: u32) -> GitHubArtifactSource {
    let mut config = GitHubConfig::new("buildsi/build-abi-test-results")
        .with_api_base(api_base)
        .with_token("test-token");
    config.page_size = page_size;
    config.rate_limit_backoff = StdDuration::from_millis(10);
    config.rate_limit_retries = 2;
    GitHubArtifactSource::new(config).unwrap()
}

#[tokio::test]
async fn test_lists_until_short_page() {
    let now = Utc::now();
    let (base, requests) = serve(vec![
        (
            200,
            page(vec![
                wire(3, "a-1-b-2-lib.xml", now - Duration::hours(1)),
                wire(2, "c-1-d-2-lib.xml", now - Duration::hours(2)),
            ]),
        ),
        (200, page(vec![wire(1, "e-1-f-2-lib.xml", now - Duration::hours(3))])),
    ])
    .await;

    let listed = source(&base, 2)
        .list(now - Duration::days(2))
        .await
        .unwrap();

    let ids: Vec<u64> = listed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with(
        "GET /repos/buildsi/build-abi-test-results/actions/artifacts?per_page=2&page=1 "
    ));
    assert!(requests[1].contains("page=2"));
    assert!(requests[0].to_ascii_lowercase().contains("authorization: token test-token"));
    assert!(requests[0].contains("application/vnd.github.v3+json"));
}

#[tokio::test]
async fn test_stops_once_page_reaches_past_window() {
    let now = Utc::now();
    let (base, requests) = serve(vec![(
        200,
        page(vec![
            wire(2, "a-1-b-2-lib.xml", now - Duration::hours(1)),
            wire(1, "c-1-d-2-lib.xml", now - Duration::days(5)),
        ]),
    )])
    .await;

    let listed = source(&base, 2)
        .list(now - Duration::days(2))
        .await
        .unwrap();

    // The old entry is still returned; the caller's filter drops it.
    assert_eq!(listed.len(), 2);
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let now = Utc::now();
    let (base, requests) = serve(vec![
        (403, json!({"message": "API rate limit exceeded"}).to_string()),
        (200, page(vec![wire(1, "a-1-b-2-lib.xml", now)])),
    ])
    .await;

    let listed = source(&base, 100)
        .list(now - Duration::days(2))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rate_limit_exhaustion_is_upstream_unavailable() {
    let forbidden = json!({"message": "API rate limit exceeded"}).to_string();
    let (base, _) = serve(vec![
        (403, forbidden.clone()),
        (403, forbidden.clone()),
        (403, forbidden),
    ])
    .await;

    let err = source(&base, 100)
        .list(Utc::now() - Duration::days(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "upstream_unavailable");
}

#[tokio::test]
async fn test_server_error_is_upstream_unavailable() {
    let (base, _) = serve(vec![(500, "{}".to_string())]).await;
    let err = source(&base, 100)
        .list(Utc::now() - Duration::days(2))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_unreachable_host_is_upstream_unavailable() {
    let err = source("http://127.0.0.1:1", 100)
        .list(Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "upstream_unavailable");
}

#[tokio::test]
async fn test_fetch_payload_and_failure() {
    let (base, _) = serve(vec![
        (200, "<abi-corpus/>".to_string()),
        (404, "{}".to_string()),
    ])
    .await;
    let src = source(&base, 100);
    let now = Utc::now();
    let artifact = ArtifactDescriptor::new(
        7,
        "libabigail-1.8-zlib-1.2.11-lib.xml",
        now,
        now + Duration::days(90),
        format!("{base}/download/7"),
    );

    assert_eq!(src.fetch(&artifact).await.unwrap(), b"<abi-corpus/>");

    let err = src.fetch(&artifact).await.unwrap_err();
    assert_eq!(err.kind(), "download_failed");
    assert!(!err.is_fatal());
}
