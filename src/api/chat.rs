//! Chat completions.

use reqwest::Method;

use crate::client::{Client, Payload, ResponseMeta};
use crate::error::{ClientError, Result};
use crate::failover::CHAT_COMPLETIONS_PATH;
use crate::model::{ChatCompletionRequest, ChatCompletionResponse, Content, Role};
use crate::options::RequestOptions;
use crate::sse::{self, EventStream};

/// System prompt used when a system message has no text.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub struct Chat<'a> {
    client: &'a Client,
}

impl<'a> Chat<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Create a completion. Streaming requests are rejected; use
    /// [`create_stream`](Self::create_stream).
    pub async fn create(
        &self,
        request: ChatCompletionRequest,
        options: RequestOptions,
    ) -> Result<ChatCompletionResponse> {
        let (response, _) = self.create_with_response(request, options).await?;
        Ok(response)
    }

    pub async fn create_with_response(
        &self,
        request: ChatCompletionRequest,
        options: RequestOptions,
    ) -> Result<(ChatCompletionResponse, ResponseMeta)> {
        if request.stream == Some(true) {
            return Err(ClientError::InvalidRequest(
                "Use create_stream() for streaming responses".to_string(),
            ));
        }

        let request = normalize_system_messages(request);
        self.client
            .with_response(Method::POST, CHAT_COMPLETIONS_PATH, Some(Payload::json(&request)?), options)
            .await
    }

    /// Create a streaming completion.
    ///
    /// ```no_run
    /// use futures::StreamExt;
    /// use svector::model::{ChatCompletionRequest, ChatMessage};
    ///
    /// # async fn run(client: svector::Client) -> svector::Result<()> {
    /// let request = ChatCompletionRequest::new("spec-3-turbo", vec![ChatMessage::user("Tell me a story")]);
    /// let mut stream = client.chat().create_stream(request, Default::default()).await?;
    /// while let Some(event) = stream.next().await {
    ///     if let Some(text) = event?.content() {
    ///         print!("{text}");
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_stream(&self, request: ChatCompletionRequest, options: RequestOptions) -> Result<EventStream> {
        let (events, _) = self.create_stream_with_response(request, options).await?;
        Ok(events)
    }

    pub async fn create_stream_with_response(
        &self,
        request: ChatCompletionRequest,
        options: RequestOptions,
    ) -> Result<(EventStream, ResponseMeta)> {
        let mut request = normalize_system_messages(request);
        request.stream = Some(true);

        let response = self
            .client
            .request_stream(Method::POST, CHAT_COMPLETIONS_PATH, Some(Payload::json(&request)?), options)
            .await?;
        let meta = ResponseMeta {
            status: response.status,
            headers: response.headers.clone(),
        };
        Ok((sse::event_stream(response)?, meta))
    }
}

/// Flatten system messages to plain text, substituting the default prompt for blank ones.
fn normalize_system_messages(mut request: ChatCompletionRequest) -> ChatCompletionRequest {
    for message in request.messages.iter_mut().filter(|m| m.role == Role::System) {
        let text = message.content.as_text();
        message.content = if text.trim().is_empty() {
            Content::Text(DEFAULT_SYSTEM_PROMPT.to_string())
        } else {
            Content::Text(text)
        };
    }
    request
}
