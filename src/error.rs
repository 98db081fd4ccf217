//! Error taxonomy for the SVECTOR client.
//!
//! Every failure that comes from an HTTP exchange is an [`ApiError`]: one record
//! tagged with an [`ErrorKind`] and carrying the status, request id and a snapshot
//! of the response headers. Everything else (bad configuration, unreadable files,
//! malformed payloads) is a dedicated [`ClientError`] variant.

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Classification of an API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 401
    Authentication,
    /// 403
    PermissionDenied,
    /// 404
    NotFound,
    /// 405, never retried.
    MethodNotAllowed,
    /// 413, reported by the vision failover path.
    PayloadTooLarge,
    /// 422
    UnprocessableEntity,
    /// 429
    RateLimit,
    /// 5xx, including gateway and edge timeouts.
    InternalServer,
    /// Any other non-2xx status.
    Api,
    /// Transport failure, or retries exhausted.
    Connection,
    /// The request did not complete before its deadline.
    ConnectionTimeout,
}

impl ErrorKind {
    /// Map an HTTP status code onto its error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::PermissionDenied,
            404 => ErrorKind::NotFound,
            405 => ErrorKind::MethodNotAllowed,
            422 => ErrorKind::UnprocessableEntity,
            429 => ErrorKind::RateLimit,
            s if s >= 500 => ErrorKind::InternalServer,
            _ => ErrorKind::Api,
        }
    }
}

/// A classified API failure.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub request_id: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            request_id: None,
            headers: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers = Some(header_snapshot(headers));
        self
    }

    /// Prefix the message with the operation that failed, keeping the classification.
    pub fn context(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }

    /// `401` or missing credentials.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message).with_status(401)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionTimeout, message)
    }

    /// Build the error for a non-2xx response.
    ///
    /// `body` is the parsed error payload, or `None` when the body was not JSON.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: Option<&Value>) -> Self {
        let code = status.as_u16();
        let message = match body {
            Some(value) => extract_message(value).unwrap_or_else(|| format!("HTTP {code}")),
            None => status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {code}")),
        };

        let message = match code {
            405 => "Method Not Allowed. Please check the API endpoint and HTTP method.".to_string(),
            502 => "Bad Gateway - API server temporarily unavailable".to_string(),
            503 => "Service Unavailable - API server temporarily overloaded".to_string(),
            504 => "Gateway Timeout - API request timed out".to_string(),
            524 => "Cloudflare Timeout - Request took too long to process".to_string(),
            _ => message,
        };

        Self::new(ErrorKind::from_status(code), message)
            .with_status(code)
            .with_request_id(request_id(headers))
            .with_headers(headers)
    }
}

/// Rules applied in order to pull a human message out of an error payload.
type MessageRule = fn(&Value) -> Option<&str>;

const MESSAGE_RULES: &[MessageRule] = &[top_message, top_error, nested_error, top_detail];

fn top_message(v: &Value) -> Option<&str> {
    v.get("message").and_then(Value::as_str)
}

fn top_error(v: &Value) -> Option<&str> {
    v.get("error").and_then(Value::as_str)
}

fn nested_error(v: &Value) -> Option<&str> {
    v.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
}

fn top_detail(v: &Value) -> Option<&str> {
    v.get("detail").and_then(Value::as_str)
}

/// Extract an error message from a heterogeneous error body. First match wins.
pub fn extract_message(body: &Value) -> Option<String> {
    MESSAGE_RULES
        .iter()
        .find_map(|rule| rule(body))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Read the observability request id from response headers.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn header_snapshot(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.to_string(), val.to_string())))
        .collect()
}

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl ClientError {
    /// The API error kind, if this is a classified API failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(e) => e.status,
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientError::Api(e) => e.request_id.as_deref(),
            _ => None,
        }
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
