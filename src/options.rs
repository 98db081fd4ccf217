//! Client configuration and per-request overrides.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use nonempty::NonEmpty;

use crate::http::Fetch;
use crate::runtime::{Environment, Platform, ProcessEnvironment};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://spec-chat.tech";

/// Default request timeout (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SVECTOR_API_KEY";

/// Options used to construct a [`Client`](crate::Client).
///
/// ```
/// use std::time::Duration;
/// use svector::options::ClientOptions;
///
/// let options = ClientOptions::new()
///     .with_api_key("sk-...")
///     .with_timeout(Duration::from_secs(30))
///     .with_max_retries(5);
/// assert_eq!(options.max_retries, 5);
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    /// API key. Falls back to `SVECTOR_API_KEY` from [`environment`](Self::environment).
    pub api_key: Option<String>,
    /// API host. Trailing slashes are removed.
    pub base_url: String,
    /// Default deadline for a single attempt.
    pub timeout: Duration,
    /// Default retry budget.
    pub max_retries: u32,
    /// Explicit transport, preferred over anything the platform provides.
    pub fetch: Option<Arc<dyn Fetch>>,
    /// Allow construction inside a browser page.
    pub dangerously_allow_browser: bool,
    /// Host description used to resolve transport and file capabilities.
    pub platform: Platform,
    /// Source for the API key fallback.
    pub environment: Arc<dyn Environment>,
    /// Vision failover behaviour.
    pub vision: FailoverOptions,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("fetch", &self.fetch.is_some())
            .field("dangerously_allow_browser", &self.dangerously_allow_browser)
            .field("platform", &self.platform)
            .field("vision", &self.vision)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            fetch: None,
            dangerously_allow_browser: false,
            platform: Platform::current(),
            environment: Arc::new(ProcessEnvironment),
            vision: FailoverOptions::default(),
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn with_dangerously_allow_browser(mut self, allow: bool) -> Self {
        self.dangerously_allow_browser = allow;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_vision(mut self, vision: FailoverOptions) -> Self {
        self.vision = vision;
        self
    }
}

/// Settings for the vision request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverOptions {
    /// Hosts tried after the client's own base URL, in order.
    pub fallback_base_urls: Vec<String>,
    /// Attempts per endpoint.
    pub retries_per_endpoint: u32,
    /// Deadline for one attempt.
    pub timeout: Duration,
    /// Upper bound of the backoff after a network failure.
    pub max_backoff: Duration,
}

impl Default for FailoverOptions {
    fn default() -> Self {
        Self {
            fallback_base_urls: vec![DEFAULT_BASE_URL.to_string()],
            retries_per_endpoint: 2,
            timeout: Duration::from_secs(60),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl FailoverOptions {
    pub fn with_fallback_base_urls(mut self, urls: Vec<String>) -> Self {
        self.fallback_base_urls = urls;
        self
    }

    pub fn with_retries_per_endpoint(mut self, retries: u32) -> Self {
        self.retries_per_endpoint = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Chat-completions URLs to try: `primary` first, then every fallback.
    pub fn endpoints(&self, primary: &str, path: &str) -> NonEmpty<String> {
        let mut endpoints = NonEmpty::new(format!("{primary}{path}"));
        for base in &self.fallback_base_urls {
            endpoints.push(format!("{}{path}", base.trim_end_matches('/')));
        }
        endpoints
    }
}

/// Per-call overrides. Unset fields use the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra headers. An explicit `content-type` suppresses the JSON default.
    pub headers: Option<HashMap<String, String>>,
    /// Query parameters, appended in insertion order.
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Whether the caller set a content type, ignoring header case.
    pub fn has_content_type(&self) -> bool {
        self.headers
            .as_ref()
            .is_some_and(|h| h.keys().any(|k| k.eq_ignore_ascii_case("content-type")))
    }
}
