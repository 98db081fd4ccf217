//! # svector - Rust client for the SVECTOR Spec-Chat API
//!
//! Typed, async access to chat completions, conversations, vision analysis,
//! file uploads and knowledge collections.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Automatic retries with exponential backoff on transient failures
//! - Streaming completions decoded from Server-Sent Events
//! - Vision requests with multi-endpoint failover
//! - Pluggable transport through the [`Fetch`](http::Fetch) trait
//!
//! ## Architecture
//!
//! 1. **[`Client`]** holds the credential and resolved transport, and runs the
//!    request engine (timeouts, retries, error classification).
//! 2. **Endpoint wrappers** in [`api`] (`client.chat()`, `client.vision()`, ...)
//!    build typed requests and funnel them into the engine, the SSE decoder in
//!    [`sse`] or the vision failover path in [`failover`].
//! 3. **[`runtime`]** decides, once per client, which transport and file
//!    utility to use and whether running inside a browser page is allowed.
//!
//! Every failure is a [`ClientError`]; HTTP and transport failures carry an
//! [`ApiError`] tagged with an [`ErrorKind`].
//!
//! ## Example
//! ```no_run
//! use svector::model::{ChatCompletionRequest, ChatMessage};
//! use svector::{Client, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientOptions::new().with_api_key("your-api-key"))?;
//!
//!     let request = ChatCompletionRequest::new(
//!         "spec-3-turbo",
//!         vec![
//!             ChatMessage::system("You are a helpful assistant."),
//!             ChatMessage::user("Hello!"),
//!         ],
//!     );
//!     let response = client.chat().create(request, Default::default()).await?;
//!     println!("{}", response.content().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod failover;
pub mod file;
pub mod http;
pub mod model;
pub mod options;
pub mod retry;
pub mod runtime;
pub mod sse;

pub use client::{Client, Payload, ResponseMeta};
pub use error::{ApiError, ClientError, ErrorKind, Result};
pub use file::{to_file, FileData, FileInput, FormData};
pub use options::{ClientOptions, FailoverOptions, RequestOptions};
pub use runtime::{Platform, Runtime};
pub use sse::EventStream;

// Re-export nonempty for `compare_images`
pub use nonempty;
