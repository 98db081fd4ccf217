#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use svector::http::{Fetch, FetchError, FetchRequest, FetchResponse, RequestBody};
use svector::runtime::StaticEnvironment;
use svector::{Client, ClientOptions, FailoverOptions, Platform, Runtime};

/// One scripted transport outcome.
pub enum Scripted {
    Respond {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: String,
    },
    Fail(FetchError),
    /// Never completes; only a deadline ends the attempt.
    Hang,
}

pub fn reply(status: u16, body: Value) -> Scripted {
    Scripted::Respond {
        status,
        headers: vec![("content-type", "application/json")],
        body: body.to_string(),
    }
}

pub fn text(status: u16, body: &str) -> Scripted {
    Scripted::Respond {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

pub fn with_request_id(status: u16, body: Value, request_id: &'static str) -> Scripted {
    Scripted::Respond {
        status,
        headers: vec![("content-type", "application/json"), ("x-request-id", request_id)],
        body: body.to_string(),
    }
}

pub fn sse(body: &str) -> Scripted {
    Scripted::Respond {
        status: 200,
        headers: vec![("content-type", "text/event-stream")],
        body: body.to_string(),
    }
}

pub fn completion(content: &str) -> Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "spec-3-turbo",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    })
}

/// Transport double that replays a script and records every request.
#[derive(Default)]
pub struct MockFetch {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockFetch {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(Mutex::new(script.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// JSON body of the `index`-th request.
    pub fn json_body(&self, index: usize) -> Value {
        match &self.requests()[index].body {
            Some(RequestBody::Json(text)) => serde_json::from_str(text).unwrap(),
            other => panic!("expected JSON body, got {other:?}"),
        }
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(Scripted::Respond { status, headers, body }) => {
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    map.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
                }
                Ok(FetchResponse::from_bytes(
                    StatusCode::from_u16(status).unwrap(),
                    map,
                    body,
                ))
            }
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(FetchError::Other("script exhausted".to_string())),
        }
    }
}

pub fn options(fetch: Arc<MockFetch>) -> ClientOptions {
    ClientOptions::new()
        .with_api_key("sk-test")
        .with_base_url("https://api.test")
        .with_platform(Platform::new(Runtime::Native))
        .with_environment(Arc::new(StaticEnvironment::new()))
        .with_vision(FailoverOptions::default().with_fallback_base_urls(vec!["https://backup.test".to_string()]))
        .with_fetch(fetch)
}

pub fn client(fetch: Arc<MockFetch>) -> Client {
    Client::new(options(fetch)).unwrap()
}
