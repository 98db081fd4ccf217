//! Host runtime capabilities.
//!
//! A client needs three things from its host: a transport, a way to build
//! upload files, and a decision on whether it is running inside a browser
//! page where the API key would be visible to page scripts. The host describes
//! itself with a [`Platform`]; [`resolve`] turns that into [`Capabilities`]
//! once, at client construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ClientError, Result};
use crate::file::FileBuilder;
use crate::http::{Fetch, ReqwestFetch};

/// Error text for unguarded browser use.
pub const BROWSER_GUARD_MESSAGE: &str = "SVECTOR client is being used in a browser environment \
without dangerously_allow_browser set to true. This is strongly discouraged as it exposes your \
API key to client-side code. If you understand the risks, enable dangerously_allow_browser in the \
client options.";

/// The kind of host the client runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    /// A native process (server, CLI, desktop).
    Native,
    /// A browser page with a document.
    Browser,
    /// Server-side rendering of a web application.
    ServerRendered,
    /// An edge function runtime.
    Edge,
    /// A web or service worker.
    Worker,
    /// The secondary script runtime target.
    Alternate,
}

impl Runtime {
    /// The runtime this crate was compiled for.
    pub fn current() -> Self {
        if cfg!(all(target_arch = "wasm32", target_os = "unknown")) {
            Runtime::Browser
        } else {
            Runtime::Native
        }
    }

    /// Whether this runtime exposes the client to page scripts.
    ///
    /// Server-rendered, edge, worker and alternate runtimes are exempt.
    pub fn is_restricted_browser(self) -> bool {
        matches!(self, Runtime::Browser)
    }
}

/// Source of configuration values such as `SVECTOR_API_KEY`.
pub trait Environment: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables. An empty one disables environment fallback.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// What the host offers, checked in order by [`resolve`].
#[derive(Clone)]
pub struct Platform {
    runtime: Runtime,
    global_fetch: Option<Arc<dyn Fetch>>,
    runtime_fetch: Option<Arc<dyn Fetch>>,
    files: FileBuilder,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("runtime", &self.runtime)
            .field("global_fetch", &self.global_fetch.is_some())
            .field("runtime_fetch", &self.runtime_fetch.is_some())
            .field("files", &self.files)
            .finish()
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl Platform {
    /// A bare platform with no transport. The alternate runtime only builds
    /// files from in-memory input.
    pub fn new(runtime: Runtime) -> Self {
        let files = match runtime {
            Runtime::Alternate => FileBuilder::buffered(),
            _ => FileBuilder::full(),
        };
        Self {
            runtime,
            global_fetch: None,
            runtime_fetch: None,
            files,
        }
    }

    /// The compiled target, with reqwest as its global transport.
    pub fn current() -> Self {
        Self::new(Runtime::current()).with_global_fetch(Arc::new(ReqwestFetch::default()))
    }

    pub fn with_global_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.global_fetch = Some(fetch);
        self
    }

    pub fn with_runtime_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.runtime_fetch = Some(fetch);
        self
    }

    pub fn with_files(mut self, files: FileBuilder) -> Self {
        self.files = files;
        self
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime
    }
}

/// Capabilities selected for one client.
#[derive(Clone)]
pub struct Capabilities {
    pub fetch: Arc<dyn Fetch>,
    pub files: FileBuilder,
    pub restricted_browser: bool,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("files", &self.files)
            .field("restricted_browser", &self.restricted_browser)
            .finish_non_exhaustive()
    }
}

/// Pick the transport and file builder for a client.
///
/// Transport order: `explicit`, then the platform's global transport, then its
/// runtime-specific one. A browser page is rejected unless `allow_browser`.
pub fn resolve(
    platform: &Platform,
    explicit: Option<Arc<dyn Fetch>>,
    allow_browser: bool,
) -> Result<Capabilities> {
    let restricted_browser = platform.runtime.is_restricted_browser();
    if restricted_browser && !allow_browser {
        return Err(ClientError::Config(BROWSER_GUARD_MESSAGE.to_string()));
    }

    let fetch = explicit
        .or_else(|| platform.global_fetch.clone())
        .or_else(|| platform.runtime_fetch.clone())
        .ok_or_else(|| {
            ClientError::Config(
                "No fetch implementation found. Provide a transport via ClientOptions::with_fetch \
                 or a platform with a global transport."
                    .to_string(),
            )
        })?;

    tracing::debug!(runtime = ?platform.runtime, "resolved client capabilities");

    Ok(Capabilities {
        fetch,
        files: platform.files,
        restricted_browser,
    })
}
