//! HTTP transport used by the client.
//!
//! The client never talks to reqwest directly. It goes through the [`Fetch`]
//! capability, which hosts can replace (tests, proxies, alternate runtimes).
//! [`ReqwestFetch`] is the default implementation.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;

use crate::error::ApiError;
use crate::file::FormData;

/// Response body as a stream of chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Transport-level failures. No HTTP status was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => ApiError::timeout("Request timed out"),
            other => ApiError::connection(format!("Connection error: {other}")),
        }
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Serialized JSON text.
    Json(String),
    /// Multipart form, passed through unchanged.
    Form(FormData),
}

/// A fully built request, ready for the transport.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

/// A response as seen by the client.
///
/// `body` is `None` when the transport could not expose a readable body.
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<BodyStream>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body.is_some())
            .finish()
    }
}

impl FetchResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<BodyStream>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response whose whole body is already in memory.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let stream = futures::stream::once(async move { Ok::<_, FetchError>(body) });
        Self::new(status, headers, Some(Box::pin(stream)))
    }

    /// Value of the `x-request-id` header.
    pub fn request_id(&self) -> Option<String> {
        crate::error::request_id(&self.headers)
    }

    /// Collect the body and log it.
    pub async fn bytes_logged(self) -> Result<Bytes, FetchError> {
        let Some(mut body) = self.body else {
            return Ok(Bytes::new());
        };

        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let bytes = buf.freeze();

        if let Ok(text) = std::str::from_utf8(&bytes) {
            tracing::debug!("API response ({} bytes):\n{}", text.len(), text);
        }

        Ok(bytes)
    }

    /// Collect the body as text, replacing invalid UTF-8.
    pub async fn text_logged(self) -> Result<String, FetchError> {
        let bytes = self.bytes_logged().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The transport capability: something that can perform one HTTP exchange.
///
/// Implementations must not retry and must not apply their own deadline; the
/// client owns both.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Default transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a transport that routes every request through `proxy_url`.
    pub fn with_proxy(proxy_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy_url)?)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        match request.body {
            Some(RequestBody::Json(text)) => {
                builder = builder.body(text);
            }
            Some(RequestBody::Form(form)) => {
                let multipart = form
                    .to_multipart()
                    .map_err(|e| FetchError::Other(e.to_string()))?;
                builder = builder.multipart(multipart);
            }
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body: BodyStream = Box::pin(response.bytes_stream().map_err(FetchError::from));

        Ok(FetchResponse::new(status, headers, Some(body)))
    }
}

/// Log an outgoing JSON body.
pub(crate) fn log_request_body(body: &str) {
    tracing::debug!("API request body ({} bytes):\n{}", body.len(), body);
}
