mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{options, reply, MockFetch};
use futures::stream;
use serde_json::json;
use svector::file::ByteStream;
use svector::options::{DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use svector::runtime::StaticEnvironment;
use svector::{Client, ClientError, ClientOptions, ErrorKind, FailoverOptions, Platform, RequestOptions, Runtime};

fn models_body() -> serde_json::Value {
    json!({"models": ["spec-3-turbo", "spec-3"]})
}

#[test]
fn test_missing_api_key() {
    let fetch = MockFetch::new(vec![]);
    let mut opts = options(fetch.clone());
    opts.api_key = None;

    let err = Client::new(opts).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Authentication));
    assert!(err.to_string().contains("SVECTOR_API_KEY"));
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn test_api_key_from_environment() {
    let fetch = MockFetch::new(vec![reply(200, models_body())]);
    let mut opts = options(fetch.clone())
        .with_environment(Arc::new(StaticEnvironment::new().with_var("SVECTOR_API_KEY", "sk-env")));
    opts.api_key = None;

    let client = Client::new(opts).unwrap();
    let models = client.models().list(RequestOptions::new()).await.unwrap();
    assert_eq!(models.models, ["spec-3-turbo", "spec-3"]);
    assert_eq!(fetch.requests()[0].headers["authorization"], "Bearer sk-env");
}

#[tokio::test]
async fn test_empty_api_key_falls_back_to_environment() {
    let fetch = MockFetch::new(vec![reply(200, models_body())]);
    let opts = options(fetch.clone())
        .with_api_key("")
        .with_environment(Arc::new(StaticEnvironment::new().with_var("SVECTOR_API_KEY", "sk-env")));

    let client = Client::new(opts).unwrap();
    client.models().list(RequestOptions::new()).await.unwrap();
    assert_eq!(fetch.requests()[0].headers["authorization"], "Bearer sk-env");
}

#[tokio::test]
async fn test_explicit_key_wins_over_environment() {
    let fetch = MockFetch::new(vec![reply(200, models_body())]);
    let opts = options(fetch.clone())
        .with_environment(Arc::new(StaticEnvironment::new().with_var("SVECTOR_API_KEY", "sk-env")));

    let client = Client::new(opts).unwrap();
    client.models().list(RequestOptions::new()).await.unwrap();

    let request = &fetch.requests()[0];
    assert_eq!(request.headers["authorization"], "Bearer sk-test");
    assert!(request.headers["user-agent"].to_str().unwrap().starts_with("svector-rust/"));
    assert_eq!(request.url.as_str(), "https://api.test/api/models");
}

#[test]
fn test_browser_guard() {
    let fetch = MockFetch::new(vec![]);
    let opts = options(fetch.clone()).with_platform(Platform::new(Runtime::Browser));

    let err = Client::new(opts.clone()).unwrap_err();
    assert!(matches!(err, ClientError::Config(ref msg) if msg.contains("dangerously_allow_browser")));

    let client = Client::new(opts.with_dangerously_allow_browser(true)).unwrap();
    assert_eq!(client.base_url(), "https://api.test");
}

#[tokio::test]
async fn test_create_from_path_unavailable_in_browser() {
    let fetch = MockFetch::new(vec![]);
    let opts = options(fetch.clone())
        .with_platform(Platform::new(Runtime::Browser))
        .with_dangerously_allow_browser(true);
    let client = Client::new(opts).unwrap();

    let err = client
        .files()
        .create_from_path("/etc/hostname", None, RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));
    assert_eq!(fetch.calls(), 0);
}

#[test]
fn test_missing_transport() {
    let opts = ClientOptions::new()
        .with_api_key("sk-test")
        .with_platform(Platform::new(Runtime::Native));

    let err = Client::new(opts).unwrap_err();
    assert!(matches!(err, ClientError::Config(msg) if msg.contains("No fetch implementation")));
}

#[test]
fn test_default_options() {
    let opts = ClientOptions::default();
    assert_eq!(opts.base_url, DEFAULT_BASE_URL);
    assert_eq!(opts.timeout, DEFAULT_TIMEOUT);
    assert_eq!(opts.timeout, Duration::from_secs(600));
    assert_eq!(opts.max_retries, DEFAULT_MAX_RETRIES);
    assert!(!opts.dangerously_allow_browser);
    assert!(opts.api_key.is_none());

    let vision = opts.vision;
    assert_eq!(vision.retries_per_endpoint, 2);
    assert_eq!(vision.timeout, Duration::from_secs(60));
    assert_eq!(vision.max_backoff, Duration::from_secs(10));
}

#[test]
fn test_failover_endpoints() {
    let failover = FailoverOptions::default()
        .with_fallback_base_urls(vec!["https://b1.test/".into(), "https://b2.test".into()]);
    let endpoints = failover.endpoints("https://api.test", "/api/chat/completions");

    let urls: Vec<_> = endpoints.iter().map(String::as_str).collect();
    assert_eq!(
        urls,
        [
            "https://api.test/api/chat/completions",
            "https://b1.test/api/chat/completions",
            "https://b2.test/api/chat/completions",
        ]
    );
}

#[test]
fn test_options_debug_hides_key() {
    let opts = ClientOptions::new().with_api_key("sk-very-secret");
    let debug = format!("{opts:?}");
    assert!(!debug.contains("sk-very-secret"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_request_options_content_type_detection() {
    assert!(!RequestOptions::new().has_content_type());
    assert!(RequestOptions::new()
        .with_header("Content-Type", "text/plain")
        .has_content_type());
}

#[tokio::test]
async fn test_to_file_per_runtime() {
    let native = Client::new(options(MockFetch::new(vec![]))).unwrap();
    let chunks: ByteStream = Box::pin(stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from_static(b"hello ")),
        Ok(Bytes::from_static(b"world")),
    ]));
    let file = native.to_file(chunks, Some("greeting.txt"), None).await.unwrap();
    assert_eq!(file.name, "greeting.txt");
    assert_eq!(file.data, Bytes::from_static(b"hello world"));

    let text = native.to_file("notes", None, None).await.unwrap();
    assert_eq!((text.name.as_str(), text.mime_type.as_str()), ("file.txt", "text/plain"));

    let alternate = Client::new(
        options(MockFetch::new(vec![])).with_platform(Platform::new(Runtime::Alternate)),
    )
    .unwrap();
    let chunks: ByteStream = Box::pin(stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"x"))]));
    let err = alternate.to_file(chunks, None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));

    let bytes = alternate.to_file(vec![1u8, 2, 3], Some("blob.bin"), None).await.unwrap();
    assert_eq!(bytes.len(), 3);
    assert_eq!(bytes.mime_type, "application/octet-stream");
}

#[tokio::test]
async fn test_clones_share_transport() {
    let fetch = MockFetch::new(vec![reply(200, models_body()), reply(200, models_body())]);
    let client = Client::new(options(fetch.clone())).unwrap();
    let clone = client.clone();

    client.models().list(RequestOptions::new()).await.unwrap();
    clone.models().list(RequestOptions::new()).await.unwrap();
    assert_eq!(fetch.calls(), 2);
}
