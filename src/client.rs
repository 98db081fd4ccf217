//! The SVECTOR client and its request engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::api::chat::Chat;
use crate::api::conversations::Conversations;
use crate::api::files::Files;
use crate::api::knowledge::Knowledge;
use crate::api::models::Models;
use crate::api::vision::Vision;
use crate::error::{ApiError, ClientError, ErrorKind, Result};
use crate::file::{FileData, FileInput, FormData};
use crate::http::{log_request_body, Fetch, FetchRequest, FetchResponse, RequestBody};
use crate::options::{ClientOptions, FailoverOptions, RequestOptions, API_KEY_ENV};
use crate::retry::{backoff_delay, is_retryable_status, should_retry, MAX_ENGINE_BACKOFF};
use crate::runtime::{self, Capabilities};

/// Client identifier sent with every request.
pub const CLIENT_IDENTIFIER: &str = concat!("svector-rust/", env!("CARGO_PKG_VERSION"));

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Serialized as JSON text with a JSON content type.
    Json(Value),
    /// Sent as multipart form data. No content type is added.
    Form(FormData),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }
}

impl From<FormData> for Payload {
    fn from(form: FormData) -> Self {
        Payload::Form(form)
    }
}

/// Status and headers of the response a payload came from.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    pub fn request_id(&self) -> Option<String> {
        crate::error::request_id(&self.headers)
    }
}

struct ClientInner {
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    vision: FailoverOptions,
    capabilities: Capabilities,
}

/// Client for the SVECTOR Spec-Chat API.
///
/// Cheap to clone; clones share configuration and transport.
///
/// ```no_run
/// use svector::{Client, ClientOptions};
///
/// # async fn run() -> svector::Result<()> {
/// let client = Client::new(ClientOptions::new().with_api_key("sk-..."))?;
/// let models = client.models().list(Default::default()).await?;
/// println!("{:?}", models.models);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.inner.base_url)
            .field("timeout", &self.inner.timeout)
            .field("max_retries", &self.inner.max_retries)
            .field("capabilities", &self.inner.capabilities)
            .finish()
    }
}

impl Client {
    /// Build a client.
    ///
    /// Fails with an authentication error when neither the options nor the
    /// environment provide an API key. Nothing is sent over the network.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let api_key = options
            .api_key
            .filter(|key| !key.is_empty())
            .or_else(|| options.environment.var(API_KEY_ENV).filter(|key| !key.is_empty()))
            .ok_or_else(|| {
                ApiError::new(
                    ErrorKind::Authentication,
                    format!(
                        "SVECTOR API key is required. Set the {API_KEY_ENV} environment variable \
                         or pass api_key in ClientOptions."
                    ),
                )
            })?;

        let capabilities = runtime::resolve(
            &options.platform,
            options.fetch,
            options.dangerously_allow_browser,
        )?;

        let base_url = options.base_url.trim_end_matches('/').to_string();
        tracing::debug!(base_url = %base_url, "created SVECTOR client");

        Ok(Self {
            inner: Arc::new(ClientInner {
                api_key,
                base_url,
                timeout: options.timeout,
                max_retries: options.max_retries,
                vision: options.vision,
                capabilities,
            }),
        })
    }

    /// Build a client from `SVECTOR_API_KEY` and default options.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(ClientOptions::default().with_api_key(api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn chat(&self) -> Chat<'_> {
        Chat::new(self)
    }

    pub fn conversations(&self) -> Conversations<'_> {
        Conversations::new(self)
    }

    pub fn models(&self) -> Models<'_> {
        Models::new(self)
    }

    pub fn files(&self) -> Files<'_> {
        Files::new(self)
    }

    pub fn knowledge(&self) -> Knowledge<'_> {
        Knowledge::new(self)
    }

    pub fn vision(&self) -> Vision<'_> {
        Vision::new(self)
    }

    /// Build an upload file with this client's runtime file utility.
    pub async fn to_file(
        &self,
        input: impl Into<FileInput>,
        filename: Option<&str>,
        mime_type: Option<&str>,
    ) -> Result<FileData> {
        self.inner
            .capabilities
            .files
            .to_file(input, filename, mime_type)
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::POST, path, payload, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::PUT, path, payload, options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        self.request(Method::DELETE, path, None, options).await
    }

    /// Send a request and decode the JSON response.
    ///
    /// Retryable statuses are retried with exponential backoff up to the
    /// retry budget. A deadline expiry is reported as
    /// [`ErrorKind::ConnectionTimeout`] and is not retried.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<T> {
        let (data, _) = self.with_response(method, path, payload, options).await?;
        Ok(data)
    }

    /// Like [`request`](Self::request), also returning the response metadata.
    pub async fn with_response<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<(T, ResponseMeta)> {
        let (value, meta) = self.execute(method, path, payload.as_ref(), &options).await?;
        let data = serde_json::from_value(value)?;
        Ok((data, meta))
    }

    /// Send a request expecting an event stream.
    ///
    /// The deadline only covers obtaining the response. There is no retry.
    /// The returned response still owns its unread body.
    pub async fn request_stream(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<FetchResponse> {
        let timeout = options.timeout.unwrap_or(self.inner.timeout);
        let request = self.build_request(method, path, payload.as_ref(), &options, true)?;

        tokio::time::timeout(timeout, self.open_stream(request))
            .await
            .map_err(|_| timed_out())?
    }

    async fn open_stream(&self, request: FetchRequest) -> Result<FetchResponse> {
        let response = self
            .inner
            .capabilities
            .fetch
            .fetch(request)
            .await
            .map_err(ApiError::from)?;
        if response.status.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let headers = response.headers.clone();
        let body = response.bytes_logged().await.map_err(ApiError::from)?;
        let error_body = serde_json::from_slice::<Value>(&body).ok();
        Err(ApiError::from_response(status, &headers, error_body.as_ref()).into())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Payload>,
        options: &RequestOptions,
    ) -> Result<(Value, ResponseMeta)> {
        let timeout = options.timeout.unwrap_or(self.inner.timeout);
        let max_retries = options.max_retries.unwrap_or(self.inner.max_retries);
        let request = self.build_request(method, path, payload, options, false)?;

        let mut retries = 0;
        loop {
            let err = match self.attempt(request.clone(), timeout).await {
                Ok(done) => return Ok(done),
                Err(ClientError::Api(err)) => err,
                Err(other) => return Err(other),
            };

            if should_retry(err.status, retries, max_retries) {
                retries += 1;
                let delay = backoff_delay(retries, MAX_ENGINE_BACKOFF);
                tracing::warn!(
                    "request to {} failed with {:?}, retry {}/{} in {:?}",
                    path,
                    err.status,
                    retries,
                    max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if err.status.is_some_and(is_retryable_status) {
                let mut exhausted = ApiError::connection(format!("Max retries exceeded: {}", err.message));
                exhausted.status = err.status;
                exhausted.request_id = err.request_id;
                exhausted.headers = err.headers;
                return Err(exhausted.into());
            }

            tracing::debug!("request to {} failed: {}", path, err);
            return Err(err.into());
        }
    }

    async fn attempt(&self, request: FetchRequest, timeout: Duration) -> Result<(Value, ResponseMeta)> {
        let exchange = async {
            let response = self
                .inner
                .capabilities
                .fetch
                .fetch(request)
                .await
                .map_err(ApiError::from)?;
            let meta = ResponseMeta {
                status: response.status,
                headers: response.headers.clone(),
            };
            let body = response.bytes_logged().await.map_err(ApiError::from)?;
            Ok::<_, ClientError>((meta, body))
        };

        let (meta, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| timed_out())??;

        if !meta.status.is_success() {
            let error_body = serde_json::from_slice::<Value>(&body).ok();
            return Err(ApiError::from_response(meta.status, &meta.headers, error_body.as_ref()).into());
        }

        let mut value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&body)?
        };
        if let (Some(id), Value::Object(map)) = (meta.request_id(), &mut value) {
            map.insert("_request_id".to_string(), Value::String(id));
        }

        Ok((value, meta))
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Payload>,
        options: &RequestOptions,
        stream: bool,
    ) -> Result<FetchRequest> {
        let raw = format!("{}{}", self.inner.base_url, path);
        let mut url = Url::parse(&raw).map_err(|e| ClientError::Config(format!("Invalid URL {raw}: {e}")))?;
        if !options.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(options.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let is_form = matches!(payload, Some(Payload::Form(_)));
        let mut headers = self.base_headers()?;
        if payload.is_some() && !is_form && !options.has_content_type() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }
        merge_headers(&mut headers, options.headers.as_ref())?;

        let body = match payload {
            Some(Payload::Json(value)) => {
                let text = serde_json::to_string(value)?;
                log_request_body(&text);
                Some(RequestBody::Json(text))
            }
            Some(Payload::Form(form)) => {
                form.validate()?;
                Some(RequestBody::Form(form.clone()))
            }
            None => None,
        };

        tracing::debug!("{} {}", method, url);

        Ok(FetchRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Authorization and client identifier headers.
    pub(crate) fn base_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.inner.api_key))
            .map_err(|_| ClientError::Config("API key contains invalid header characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_IDENTIFIER));
        Ok(headers)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Fetch> {
        &self.inner.capabilities.fetch
    }

    pub(crate) fn is_restricted_browser(&self) -> bool {
        self.inner.capabilities.restricted_browser
    }

    pub(crate) fn failover_options(&self) -> &FailoverOptions {
        &self.inner.vision
    }
}

/// Apply caller headers on top of `headers`, replacing defaults.
pub(crate) fn merge_headers(headers: &mut HeaderMap, extra: Option<&HashMap<String, String>>) -> Result<()> {
    for (key, value) in extra.into_iter().flatten() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid header name {key}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid value for header {key}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(())
}

fn timed_out() -> ApiError {
    ApiError::timeout("Request timed out")
}
