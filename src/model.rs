//! Request and response types of the Spec-Chat API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Developer,
}

/// Image resolution hint for vision models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Low,
    High,
    #[default]
    Auto,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: Option<Detail>,
}

/// One part of a rich message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>, detail: Detail) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: Some(detail),
            },
        }
    }
}

/// Message content: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// The text of a plain message, or the concatenated text parts.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect(),
        }
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<Vec<ContentPart>> for Content {
    fn from(value: Vec<ContentPart>) -> Self {
        Content::Parts(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Content,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// What a [`FileReference`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileReferenceKind {
    File,
    Collection,
}

/// Uploaded file or knowledge collection used for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    #[serde(rename = "type")]
    pub kind: FileReferenceKind,
    pub id: String,
}

impl FileReference {
    pub fn file(id: impl Into<String>) -> Self {
        Self {
            kind: FileReferenceKind::File,
            id: id.into(),
        }
    }

    pub fn collection(id: impl Into<String>) -> Self {
        Self {
            kind: FileReferenceKind::Collection,
            id: id.into(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stream: Option<bool>,
    pub files: Option<Vec<FileReference>>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            stream: None,
            files: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_files(mut self, files: Vec<FileReference>) -> Self {
        self.files = Some(files);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub index: u32,
    pub finish_reason: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<u64>,
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<Usage>,
    #[serde(rename = "_request_id")]
    pub request_id: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub role: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub index: u32,
    pub finish_reason: Option<String>,
}

/// One decoded server-sent event of a streaming completion.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl StreamEvent {
    /// Content delta of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListResponse {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(rename = "_request_id")]
    pub request_id: Option<String>,
}

/// Upload result. The server may name the id `file_id`, `id`, or both.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UploadedFile")]
pub struct FileUploadResponse {
    pub file_id: String,
    #[serde(rename = "_request_id")]
    pub request_id: Option<String>,
}

#[derive(Deserialize)]
struct UploadedFile {
    file_id: Option<String>,
    id: Option<String>,
    #[serde(rename = "_request_id")]
    request_id: Option<String>,
}

impl TryFrom<UploadedFile> for FileUploadResponse {
    type Error = &'static str;

    fn try_from(raw: UploadedFile) -> Result<Self, Self::Error> {
        let file_id = raw.file_id.or(raw.id).ok_or("missing field `file_id`")?;
        Ok(Self {
            file_id,
            request_id: raw.request_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeAddFileRequest {
    pub file_id: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeAddFileResponse {
    pub status: String,
    pub message: Option<String>,
    #[serde(rename = "_request_id")]
    pub request_id: Option<String>,
}

/// Instruction/input style request built on top of chat completions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRequest {
    pub model: String,
    /// System instructions. Blank instructions are omitted.
    pub instructions: Option<String>,
    pub input: Content,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub files: Option<Vec<FileReference>>,
    /// Earlier turns, alternating user and assistant, starting with user.
    pub context: Vec<String>,
}

impl ConversationRequest {
    pub fn new(model: impl Into<String>, input: impl Into<Content>) -> Self {
        Self {
            model: model.into(),
            instructions: None,
            input: input.into(),
            max_tokens: None,
            temperature: None,
            files: None,
            context: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_files(mut self, files: Vec<FileReference>) -> Self {
        self.files = Some(files);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationResponse {
    pub output: String,
    pub usage: Option<Usage>,
    pub request_id: Option<String>,
}

/// Streamed conversation output. The final chunk has `done` set and no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationChunk {
    pub content: String,
    pub done: bool,
}

/// Where a vision request gets its image from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    /// Raw base64 or a complete `data:` URL.
    Base64(String),
    /// Id of a previously uploaded file.
    FileId(String),
}

impl ImageSource {
    /// The URL sent in the `image_url` content part.
    pub fn to_url(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Base64(data) if data.starts_with("data:") => data.clone(),
            ImageSource::Base64(data) => format!("data:image/jpeg;base64,{data}"),
            ImageSource::FileId(id) => format!("file://{id}"),
        }
    }
}

/// Input to [`Vision::analyze`](crate::api::vision::Vision::analyze).
///
/// When several image fields are set, `image_url` wins, then `image_base64`,
/// then `file_id`. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAnalysisRequest {
    pub image_url: Option<String>,
    pub image_base64: Option<String>,
    pub file_id: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub detail: Option<Detail>,
}

impl ImageAnalysisRequest {
    pub fn from_source(source: ImageSource) -> Self {
        let mut request = Self::default();
        match source {
            ImageSource::Url(url) => request.image_url = Some(url),
            ImageSource::Base64(data) => request.image_base64 = Some(data),
            ImageSource::FileId(id) => request.file_id = Some(id),
        }
        request
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_options(mut self, options: &AnalyzeOptions) -> Self {
        self.model = options.model.clone().or(self.model);
        self.max_tokens = options.max_tokens.or(self.max_tokens);
        self.temperature = options.temperature.or(self.temperature);
        self.detail = options.detail.or(self.detail);
        self
    }

    /// The image to analyse, if any.
    pub fn source(&self) -> Option<ImageSource> {
        let present = |field: &Option<String>| field.clone().filter(|v| !v.is_empty());
        present(&self.image_url)
            .map(ImageSource::Url)
            .or_else(|| present(&self.image_base64).map(ImageSource::Base64))
            .or_else(|| present(&self.file_id).map(ImageSource::FileId))
    }
}

/// Model settings shared by the vision helpers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub detail: Option<Detail>,
}

impl AnalyzeOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAnalysisResponse {
    pub analysis: String,
    pub usage: Option<Usage>,
    pub request_id: Option<String>,
    /// Self-reported confidence (0-100), only from `analyze_with_confidence`.
    pub confidence: Option<u32>,
}

/// Legacy single-call vision request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionRequest {
    pub model: String,
    pub prompt: String,
    pub image_url: Option<String>,
    pub image_base64: Option<String>,
    pub file_id: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub detail: Option<Detail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionResponse {
    pub analysis: String,
    pub usage: Option<Usage>,
    pub request_id: Option<String>,
}

/// Content of a [`ResponseInputMessage`].
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseInputContent {
    InputText {
        text: String,
    },
    InputImage {
        image_url: Option<String>,
        file_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInputMessage {
    pub role: Role,
    pub content: Vec<ResponseInputContent>,
}

/// Responses-style vision request: typed input parts instead of a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCreateRequest {
    pub model: String,
    pub input: Vec<ResponseInputMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutput {
    pub output_text: String,
    pub usage: Option<Usage>,
    pub request_id: Option<String>,
}

/// One image of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImage {
    pub source: ImageSource,
    pub prompt: Option<String>,
}

/// Settings for a sequential batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub analyze: AnalyzeOptions,
    /// Pause between consecutive requests.
    pub delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            analyze: AnalyzeOptions::default(),
            delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of one batch item. A failed item has an empty analysis and an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub analysis: String,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}
