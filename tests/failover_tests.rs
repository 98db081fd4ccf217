mod common;

use std::time::Duration;

use common::{client, completion, options, reply, text, with_request_id, MockFetch, Scripted};
use nonempty::nonempty;
use serde_json::json;
use svector::http::FetchError;
use svector::model::{
    AnalyzeOptions, BatchImage, BatchOptions, Detail, ImageAnalysisRequest, ImageSource, ResponseCreateRequest,
    ResponseInputContent, ResponseInputMessage, Role, VisionRequest,
};
use svector::{Client, ClientError, ErrorKind, FailoverOptions, RequestOptions};
use tokio::time::Instant;

fn url_request() -> ImageAnalysisRequest {
    ImageAnalysisRequest::from_source(ImageSource::Url("https://img.test/cat.jpg".into()))
}

#[tokio::test]
async fn test_analyze_builds_chat_request() {
    let fetch = MockFetch::new(vec![with_request_id(200, completion("A cat"), "req-v")]);
    let client = client(fetch.clone());

    let response = client
        .vision()
        .analyze(url_request().with_prompt("What is this?"), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.analysis, "A cat");
    assert_eq!(response.request_id.as_deref(), Some("req-v"));

    let request = &fetch.requests()[0];
    assert_eq!(request.url.as_str(), "https://api.test/api/chat/completions");
    assert_eq!(request.headers["authorization"], "Bearer sk-test");
    assert_eq!(
        fetch.json_body(0),
        json!({
            "model": "spec-3-turbo",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "What is this?"},
                    {"type": "image_url", "image_url": {"url": "https://img.test/cat.jpg", "detail": "auto"}}
                ]
            }],
            "max_tokens": 1000,
            "temperature": 0.7
        })
    );
}

#[tokio::test]
async fn test_analyze_requires_an_image() {
    let fetch = MockFetch::new(vec![]);
    let client = client(fetch.clone());

    let err = client
        .vision()
        .analyze(ImageAnalysisRequest::default(), RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(msg) if msg.contains("image_url")));
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn test_empty_image_url_falls_through_to_base64() {
    let fetch = MockFetch::new(vec![reply(200, completion("a"))]);
    let client = client(fetch.clone());

    let request = ImageAnalysisRequest {
        image_url: Some(String::new()),
        image_base64: Some("AAA".into()),
        ..Default::default()
    };
    client.vision().analyze(request, RequestOptions::new()).await.unwrap();

    let body = fetch.json_body(0);
    assert_eq!(
        body["messages"][0]["content"][1]["image_url"]["url"],
        "data:image/jpeg;base64,AAA"
    );

    let blank = ImageAnalysisRequest {
        image_url: Some(String::new()),
        ..Default::default()
    };
    let err = client.vision().analyze(blank, RequestOptions::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn test_gateway_timeouts_everywhere_give_guidance() {
    let fetch = MockFetch::new((0..4).map(|_| text(504, "gateway timeout")).collect());
    let client = client(fetch.clone());

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::ConnectionTimeout));
    assert_eq!(err.status(), Some(504));
    let message = err.to_string();
    assert!(message.starts_with("Vision analysis failed:"), "{message}");
    assert!(message.contains("smaller image"), "{message}");
    assert!(message.contains("detail"), "{message}");

    let hosts: Vec<_> = fetch
        .requests()
        .iter()
        .map(|r| r.url.host_str().unwrap().to_string())
        .collect();
    assert_eq!(hosts, ["api.test", "api.test", "backup.test", "backup.test"]);
}

#[tokio::test]
async fn test_payload_too_large_is_immediate() {
    let fetch = MockFetch::new(vec![text(413, "too big"), reply(200, completion("never"))]);
    let client = client(fetch.clone());

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::PayloadTooLarge));
    assert_eq!(err.status(), Some(413));
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn test_rate_limit_is_immediate() {
    let fetch = MockFetch::new(vec![text(429, "slow down"), reply(200, completion("never"))]);
    let client = client(fetch.clone());

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::RateLimit));
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn test_other_client_errors_carry_body_text() {
    let fetch = MockFetch::new(vec![text(400, "bad image"), reply(200, completion("never"))]);
    let client = client(fetch.clone());

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Api));
    assert_eq!(err.to_string(), "Vision analysis failed: HTTP 400: bad image");
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn test_server_errors_fail_over() {
    let fetch = MockFetch::new(vec![
        text(502, "bad gateway"),
        text(500, "boom"),
        reply(200, completion("Recovered")),
    ]);
    let client = client(fetch.clone());

    let response = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap();
    assert_eq!(response.analysis, "Recovered");
    assert_eq!(fetch.requests()[2].url.host_str(), Some("backup.test"));
}

#[tokio::test]
async fn test_last_server_error_is_internal() {
    let fetch = MockFetch::new((0..4).map(|_| text(500, "boom")).collect());
    let client = client(fetch.clone());

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InternalServer));
    assert_eq!(err.to_string(), "Vision analysis failed: HTTP 500: boom");
    assert_eq!(fetch.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_backs_off() {
    let fetch = MockFetch::new(vec![
        Scripted::Fail(FetchError::Connect("refused".into())),
        reply(200, completion("ok")),
    ]);
    let client = client(fetch.clone());

    let started = Instant::now();
    client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2), "{elapsed:?}");
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_network_failures_everywhere() {
    let fetch = MockFetch::new(
        (0..4)
            .map(|_| Scripted::Fail(FetchError::Connect("refused".into())))
            .collect(),
    );
    let client = client(fetch.clone());

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Connection));
    assert!(err.to_string().contains("Vision API request failed"));
    assert_eq!(fetch.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_deadline() {
    let fetch = MockFetch::new((0..4).map(|_| Scripted::Hang).collect());
    let client = client(fetch.clone());

    let options = RequestOptions::new().with_timeout(Duration::from_secs(2));
    let err = client.vision().analyze(url_request(), options).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::ConnectionTimeout));
    assert!(err.to_string().contains("smaller image"));
    assert_eq!(fetch.calls(), 4);
}

#[tokio::test]
async fn test_retries_per_endpoint_is_configurable() {
    let fetch = MockFetch::new((0..6).map(|_| text(503, "busy")).collect());
    let opts = options(fetch.clone()).with_vision(
        FailoverOptions::default()
            .with_fallback_base_urls(vec!["https://b1.test".into(), "https://b2.test".into()])
            .with_retries_per_endpoint(1),
    );
    let client = Client::new(opts).unwrap();

    let err = client.vision().analyze(url_request(), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(fetch.calls(), 3);
}

#[tokio::test]
async fn test_base64_and_file_sources() {
    let fetch = MockFetch::new(vec![reply(200, completion("a")), reply(200, completion("b"))]);
    let client = client(fetch.clone());

    client
        .vision()
        .analyze_from_bytes([0xffu8, 0xd8, 0xff], None, AnalyzeOptions::default().with_detail(Detail::Low))
        .await
        .unwrap();
    client
        .vision()
        .analyze_from_file_id("file-9", Some("Describe"), AnalyzeOptions::default().with_model("spec-3"))
        .await
        .unwrap();

    let first = fetch.json_body(0);
    let image = &first["messages"][0]["content"][1]["image_url"];
    assert_eq!(image["url"], "data:image/jpeg;base64,/9j/");
    assert_eq!(image["detail"], "low");
    assert_eq!(
        first["messages"][0]["content"][0]["text"],
        "Analyze this image and describe what you see in detail."
    );

    let second = fetch.json_body(1);
    assert_eq!(second["model"], "spec-3");
    assert_eq!(second["messages"][0]["content"][1]["image_url"]["url"], "file://file-9");
}

#[tokio::test]
async fn test_compare_images() {
    let fetch = MockFetch::new(vec![reply(200, completion("Both are cats"))]);
    let client = client(fetch.clone());

    let images = nonempty![
        ImageSource::Url("https://img.test/a.jpg".into()),
        ImageSource::Base64("data:image/png;base64,AAAA".into()),
    ];
    let response = client.vision().compare_images(images, None, AnalyzeOptions::default()).await.unwrap();
    assert_eq!(response.analysis, "Both are cats");

    let content = fetch.json_body(0)["messages"][0]["content"].clone();
    assert_eq!(content.as_array().unwrap().len(), 3);
    assert_eq!(content[2]["image_url"]["url"], "data:image/png;base64,AAAA");
}

#[tokio::test]
async fn test_compare_images_error_prefix() {
    let fetch = MockFetch::new(vec![text(413, "too big")]);
    let client = client(fetch);

    let err = client
        .vision()
        .compare_images(nonempty![ImageSource::FileId("f".into())], None, AnalyzeOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::PayloadTooLarge));
    assert!(err.to_string().starts_with("Image comparison failed:"));
}

#[tokio::test]
async fn test_legacy_create() {
    let fetch = MockFetch::new(vec![with_request_id(200, completion("A bridge"), "req-l")]);
    let client = client(fetch.clone());

    let response = client
        .vision()
        .create(
            VisionRequest {
                model: "spec-3-turbo".into(),
                prompt: "What landmark?".into(),
                image_url: Some("https://img.test/bridge.jpg".into()),
                max_tokens: Some(200),
                ..Default::default()
            },
            RequestOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.analysis, "A bridge");
    assert_eq!(response.request_id.as_deref(), Some("req-l"));
    assert_eq!(fetch.json_body(0)["max_tokens"], 200);
}

#[tokio::test]
async fn test_create_response() {
    let fetch = MockFetch::new(vec![reply(200, completion("Sunset"))]);
    let client = client(fetch.clone());

    let request = ResponseCreateRequest {
        model: "spec-3-turbo".into(),
        input: vec![ResponseInputMessage {
            role: Role::User,
            content: vec![
                ResponseInputContent::InputText { text: "Describe".into() },
                ResponseInputContent::InputImage {
                    image_url: Some("data:image/png;base64,QUJD".into()),
                    file_id: None,
                },
                ResponseInputContent::InputText { text: "briefly".into() },
            ],
        }],
        max_tokens: None,
        temperature: Some(0.2),
    };
    let output = client.vision().create_response(request, RequestOptions::new()).await.unwrap();
    assert_eq!(output.output_text, "Sunset");

    let body = fetch.json_body(0);
    assert_eq!(body["messages"][0]["content"][0]["text"], "Describe briefly");
    assert_eq!(body["messages"][0]["content"][1]["image_url"]["url"], "data:image/png;base64,QUJD");
}

#[tokio::test]
async fn test_create_response_requires_user_message() {
    let fetch = MockFetch::new(vec![]);
    let client = client(fetch);

    let request = ResponseCreateRequest {
        model: "spec-3-turbo".into(),
        input: vec![ResponseInputMessage {
            role: Role::System,
            content: vec![ResponseInputContent::InputText { text: "hi".into() }],
        }],
        max_tokens: None,
        temperature: None,
    };
    let err = client.vision().create_response(request, RequestOptions::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));
}

#[tokio::test(start_paused = true)]
async fn test_batch_analyze_is_sequential_and_tolerant() {
    let fetch = MockFetch::new(vec![
        reply(200, completion("first")),
        text(400, "unsupported format"),
        reply(200, completion("third")),
    ]);
    let client = client(fetch.clone());

    let images = vec![
        BatchImage {
            source: ImageSource::Url("https://img.test/1.jpg".into()),
            prompt: None,
        },
        BatchImage {
            source: ImageSource::Url("https://img.test/2.tiff".into()),
            prompt: Some("Read the text".into()),
        },
        BatchImage {
            source: ImageSource::FileId("f-3".into()),
            prompt: None,
        },
    ];

    let started = Instant::now();
    let results = client.vision().batch_analyze(images, BatchOptions::default()).await;
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].analysis, "first");
    assert!(results[0].error.is_none());
    assert_eq!(results[1].analysis, "");
    assert!(results[1].error.as_deref().unwrap().contains("unsupported format"));
    assert_eq!(results[2].analysis, "third");
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(fetch.json_body(1)["messages"][0]["content"][0]["text"], "Read the text");
}

#[tokio::test]
async fn test_analyze_with_confidence() {
    let fetch = MockFetch::new(vec![reply(200, completion("A red car. [Confidence: 92%]"))]);
    let client = client(fetch.clone());

    let response = client
        .vision()
        .analyze_with_confidence(url_request(), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.analysis, "A red car.");
    assert_eq!(response.confidence, Some(92));

    let prompt = fetch.json_body(0)["messages"][0]["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(prompt.starts_with("Analyze this image Please also provide a confidence score"));
}
