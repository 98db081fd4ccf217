use svector::model::{ChatCompletionRequest, ChatMessage, ConversationRequest};
use svector::{Client, RequestOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG=svector=debug to see request bodies and retries.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ============================================================================================
    // Step 1: Create the Client
    // ============================================================================================
    // `from_env` reads the key from SVECTOR_API_KEY. Use `ClientOptions` to set the key, base URL,
    // timeout or retry budget explicitly.
    let client = Client::from_env()?;

    // ============================================================================================
    // Step 2: Chat Completions
    // ============================================================================================
    // A system message with empty text is replaced by a default prompt before sending.
    let request = ChatCompletionRequest::new(
        "spec-3-turbo",
        vec![
            ChatMessage::system("You are a concise assistant."),
            ChatMessage::user("Explain quantum computing in one sentence."),
        ],
    )
    .with_max_tokens(200);

    let (response, meta) = client
        .chat()
        .create_with_response(request, RequestOptions::new())
        .await?;
    println!("Response: {}", response.content().unwrap_or_default());
    println!("Request id: {:?} (HTTP {})", meta.request_id(), meta.status);

    // ============================================================================================
    // Step 3: Conversations
    // ============================================================================================
    // Conversations take instructions plus earlier turns as plain strings, alternating between
    // user and assistant.
    let conversation = ConversationRequest::new("spec-3-turbo", "And what would it be used for?")
        .with_instructions("You explain physics to beginners.")
        .with_context(vec![
            "Explain quantum computing in one sentence.".to_string(),
            response.content().unwrap_or_default().to_string(),
        ]);

    let reply = client
        .conversations()
        .create(conversation, RequestOptions::new())
        .await?;
    println!("Follow-up: {}", reply.output);

    Ok(())
}
