use std::io::Write;

use futures::StreamExt;
use svector::model::{ChatCompletionRequest, ChatMessage, ConversationRequest};
use svector::{Client, RequestOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::from_env()?;

    // ============================================================================================
    // Step 1: Stream a Chat Completion
    // ============================================================================================
    // `create_stream` yields one event per server-sent `data:` line. Lines that are not valid
    // JSON are skipped and the stream ends at `[DONE]`.
    let request = ChatCompletionRequest::new(
        "spec-3-turbo",
        vec![ChatMessage::user("Write a haiku about the Rust borrow checker.")],
    );
    let mut events = client.chat().create_stream(request, RequestOptions::new()).await?;

    print!("Chat: ");
    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(text) = event.content() {
            print!("{text}");
            std::io::stdout().flush()?;
        }
        if let Some(reason) = event.finish_reason() {
            println!("\n[finished: {reason}]");
        }
    }

    // ============================================================================================
    // Step 2: Stream a Conversation
    // ============================================================================================
    // Conversation streams reduce events to text chunks. The last chunk has `done` set.
    let conversation = ConversationRequest::new("spec-3-turbo", "Now one about lifetimes.")
        .with_instructions("You are a poet who only writes haiku.");
    let mut chunks = client
        .conversations()
        .create_stream(conversation, RequestOptions::new())
        .await?;

    print!("Conversation: ");
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if chunk.done {
            println!();
            break;
        }
        print!("{}", chunk.content);
        std::io::stdout().flush()?;
    }

    Ok(())
}
