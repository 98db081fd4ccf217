//! Multi-endpoint failover for vision requests.
//!
//! Vision calls carry large images and are slow, so they do not use the
//! generic request engine. Each candidate endpoint gets a fixed number of
//! attempts; client errors stop immediately, server errors move on, and
//! network failures back off before the next attempt.

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::client::{merge_headers, Client};
use crate::error::{ApiError, ClientError, ErrorKind, Result};
use crate::http::{log_request_body, FetchRequest, RequestBody};
use crate::model::ChatCompletionRequest;
use crate::options::RequestOptions;
use crate::retry::backoff_delay;

/// Path of the chat-completions endpoint on every host.
pub const CHAT_COMPLETIONS_PATH: &str = "/api/chat/completions";

const SIZE_GUIDANCE: &str = "Try a smaller image or set detail to \"low\".";

/// Why one attempt failed.
#[derive(Debug)]
enum Failure {
    /// Do not retry and do not fail over.
    Terminal(ClientError),
    /// The server answered with a 5xx; try again.
    Server(ApiError),
    /// No response: connection failure or deadline.
    Network(ApiError),
}

impl Client {
    /// POST a chat-completions request for vision analysis, with failover.
    ///
    /// Tries the client's base URL first, then each configured fallback host.
    /// Only `headers` and `timeout` of `options` apply; the attempt count comes
    /// from [`FailoverOptions`](crate::options::FailoverOptions).
    pub async fn make_vision_request(
        &self,
        request: &ChatCompletionRequest,
        options: &RequestOptions,
    ) -> Result<Value> {
        let failover = self.failover_options();
        let timeout = options.timeout.unwrap_or(failover.timeout);
        let attempts = failover.retries_per_endpoint.max(1);
        let endpoints = failover.endpoints(self.base_url(), CHAT_COMPLETIONS_PATH);

        let mut headers = self.base_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        merge_headers(&mut headers, options.headers.as_ref())?;

        let body = serde_json::to_string(request)?;
        log_request_body(&body);

        let total = endpoints.len();
        for (endpoint_index, endpoint) in endpoints.iter().enumerate() {
            let url = Url::parse(endpoint)
                .map_err(|e| ClientError::Config(format!("Invalid vision endpoint {endpoint}: {e}")))?;
            let last_endpoint = endpoint_index + 1 == total;

            for retry in 0..attempts {
                let last_attempt = last_endpoint && retry + 1 == attempts;
                let attempt = FetchRequest {
                    method: Method::POST,
                    url: url.clone(),
                    headers: headers.clone(),
                    body: Some(RequestBody::Json(body.clone())),
                };

                match self.vision_attempt(attempt, timeout).await {
                    Ok(value) => return Ok(value),
                    Err(Failure::Terminal(err)) => {
                        tracing::debug!("vision request to {} failed: {}", endpoint, err);
                        return Err(err);
                    }
                    Err(Failure::Server(err)) => {
                        if last_attempt {
                            return Err(err.into());
                        }
                        tracing::warn!(
                            "vision endpoint {} answered {:?} (attempt {}/{})",
                            endpoint,
                            err.status,
                            retry + 1,
                            attempts
                        );
                    }
                    Err(Failure::Network(err)) => {
                        if last_attempt {
                            return Err(err.into());
                        }
                        let delay = backoff_delay(retry, failover.max_backoff);
                        tracing::warn!(
                            "vision endpoint {} unreachable: {} (attempt {}/{}), retrying in {:?}",
                            endpoint,
                            err,
                            retry + 1,
                            attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ApiError::connection("Vision API request failed after multiple retries").into())
    }

    async fn vision_attempt(&self, request: FetchRequest, timeout: Duration) -> std::result::Result<Value, Failure> {
        let exchange = async {
            let response = self
                .transport()
                .fetch(request)
                .await
                .map_err(|e| network_failure(ApiError::from(e), timeout))?;
            let status = response.status;
            let headers = response.headers.clone();
            let text = response
                .text_logged()
                .await
                .map_err(|e| network_failure(ApiError::from(e), timeout))?;
            Ok::<_, Failure>((status, headers, text))
        };

        let (status, headers, text) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| network_failure(ApiError::timeout("Request timed out"), timeout))??;

        let code = status.as_u16();
        if status.is_success() {
            let mut value: Value =
                serde_json::from_str(&text).map_err(|e| Failure::Terminal(ClientError::Parse(e)))?;
            if let (Some(id), Value::Object(map)) = (crate::error::request_id(&headers), &mut value) {
                map.insert("_request_id".to_string(), Value::String(id));
            }
            return Ok(value);
        }

        let (kind, message) = match code {
            413 => (
                ErrorKind::PayloadTooLarge,
                format!("Image payload too large (HTTP 413). {SIZE_GUIDANCE}"),
            ),
            429 => (
                ErrorKind::RateLimit,
                format!("Rate limit exceeded (HTTP 429): {text}"),
            ),
            504 => (
                ErrorKind::ConnectionTimeout,
                format!("Vision API gateway timed out (HTTP 504). {SIZE_GUIDANCE}"),
            ),
            _ => (ErrorKind::from_status(code), format!("HTTP {code}: {text}")),
        };
        let err = ApiError::new(kind, message)
            .with_status(code)
            .with_request_id(crate::error::request_id(&headers))
            .with_headers(&headers);

        if (400..500).contains(&code) {
            Err(Failure::Terminal(err.into()))
        } else {
            Err(Failure::Server(err))
        }
    }
}

/// Attach guidance to a timeout; other transport failures keep their message.
fn network_failure(err: ApiError, timeout: Duration) -> Failure {
    if err.kind == ErrorKind::ConnectionTimeout {
        Failure::Network(ApiError::timeout(format!(
            "Vision API request timed out after {timeout:?}. {SIZE_GUIDANCE}"
        )))
    } else {
        Failure::Network(err.context("Vision API request failed"))
    }
}
