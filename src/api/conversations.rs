//! Instruction/input conversations layered on chat completions.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::api::chat::DEFAULT_SYSTEM_PROMPT;
use crate::client::{Client, ResponseMeta};
use crate::error::Result;
use crate::model::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ConversationChunk, ConversationRequest,
    ConversationResponse, Role, StreamEvent,
};
use crate::options::RequestOptions;

/// Stream of conversation output chunks.
pub type ConversationStream = Pin<Box<dyn Stream<Item = Result<ConversationChunk>> + Send>>;

pub struct Conversations<'a> {
    client: &'a Client,
}

impl<'a> Conversations<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: ConversationRequest, options: RequestOptions) -> Result<ConversationResponse> {
        let (response, _) = self.create_with_response(request, options).await?;
        Ok(response)
    }

    pub async fn create_with_response(
        &self,
        request: ConversationRequest,
        options: RequestOptions,
    ) -> Result<(ConversationResponse, ResponseMeta)> {
        let chat = chat_request(&request, false);
        let (response, meta) = self.client.chat().create_with_response(chat, options).await?;
        Ok((conversation_response(response), meta))
    }

    /// Stream the answer as text chunks, ending with one `done` chunk.
    pub async fn create_stream(&self, request: ConversationRequest, options: RequestOptions) -> Result<ConversationStream> {
        let chat = chat_request(&request, true);
        let mut events = self.client.chat().create_stream(chat, options).await?;

        let chunks = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if let Some(chunk) = to_chunk(&event) {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}

/// Build the message list: instructions, alternating context, then the input.
pub(crate) fn build_messages(request: &ConversationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.context.len() + 2);

    let instructions = match request.instructions.as_deref() {
        None | Some("") => DEFAULT_SYSTEM_PROMPT,
        Some(text) => text,
    };
    if !instructions.trim().is_empty() {
        messages.push(ChatMessage::system(instructions));
    }

    for (i, turn) in request.context.iter().enumerate() {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        messages.push(ChatMessage::new(role, turn.as_str()));
    }

    messages.push(ChatMessage::new(Role::User, request.input.clone()));
    messages
}

fn chat_request(request: &ConversationRequest, stream: bool) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model.clone(),
        messages: build_messages(request),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: Some(stream),
        files: request.files.clone(),
    }
}

fn conversation_response(response: ChatCompletionResponse) -> ConversationResponse {
    ConversationResponse {
        output: response.content().unwrap_or_default().to_string(),
        usage: response.usage,
        request_id: response.request_id,
    }
}

fn to_chunk(event: &StreamEvent) -> Option<ConversationChunk> {
    match event.content().filter(|c| !c.is_empty()) {
        Some(content) => Some(ConversationChunk {
            content: content.to_string(),
            done: false,
        }),
        None => event.finish_reason().map(|_| ConversationChunk {
            content: String::new(),
            done: true,
        }),
    }
}
