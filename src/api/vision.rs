//! Image analysis on top of the vision failover path.
//!
//! Every call is turned into a single-message chat-completions request with a
//! text part and one or more `image_url` parts, then sent through
//! [`Client::make_vision_request`].

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use itertools::Itertools;
use nonempty::NonEmpty;
use serde_json::Value;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::model::{
    AnalyzeOptions, BatchImage, BatchOptions, BatchResult, ChatCompletionRequest, ChatCompletionResponse,
    ChatMessage, ContentPart, ImageAnalysisRequest, ImageAnalysisResponse, ImageSource, ResponseCreateRequest,
    ResponseInputContent, ResponseOutput, Role, VisionRequest, VisionResponse,
};
use crate::options::RequestOptions;

pub const DEFAULT_VISION_MODEL: &str = "spec-3-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const ANALYZE_PROMPT: &str = "Analyze this image and describe what you see in detail.";
const COMPARE_PROMPT: &str = "Compare these images and describe the similarities and differences.";
const CONFIDENCE_BASE_PROMPT: &str = "Analyze this image";
const CONFIDENCE_INSTRUCTION: &str =
    " Please also provide a confidence score (0-100) for your analysis at the end in the format: [Confidence: XX%]";
const CONFIDENCE_TAG: &str = "[Confidence:";
const NO_ANALYSIS: &str = "No analysis generated";

pub struct Vision<'a> {
    client: &'a Client,
}

impl<'a> Vision<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Analyze one image.
    ///
    /// ```no_run
    /// use svector::model::{ImageAnalysisRequest, ImageSource};
    ///
    /// # async fn run(client: svector::Client) -> svector::Result<()> {
    /// let request = ImageAnalysisRequest::from_source(ImageSource::Url("https://example.com/cat.jpg".into()))
    ///     .with_prompt("What breed is this cat?");
    /// let result = client.vision().analyze(request, Default::default()).await?;
    /// println!("{}", result.analysis);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn analyze(
        &self,
        request: ImageAnalysisRequest,
        options: RequestOptions,
    ) -> Result<ImageAnalysisResponse> {
        let source = request.source().ok_or_else(|| {
            ClientError::InvalidRequest("Must provide one of: image_url, image_base64, or file_id".to_string())
        })?;

        let prompt = request
            .prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(ANALYZE_PROMPT);
        let settings = AnalyzeOptions {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            detail: request.detail,
        };
        let parts = vec![ContentPart::text(prompt), image_part(&source, &settings)];

        self.send(parts, &settings, &options)
            .await
            .map_err(|e| with_context(e, "Vision analysis failed"))
    }

    pub async fn analyze_from_url(
        &self,
        url: impl Into<String>,
        prompt: Option<&str>,
        options: AnalyzeOptions,
    ) -> Result<ImageAnalysisResponse> {
        self.analyze_source(ImageSource::Url(url.into()), prompt, &options).await
    }

    /// Analyze base64 data, with or without a `data:` prefix.
    pub async fn analyze_from_base64(
        &self,
        data: impl Into<String>,
        prompt: Option<&str>,
        options: AnalyzeOptions,
    ) -> Result<ImageAnalysisResponse> {
        self.analyze_source(ImageSource::Base64(data.into()), prompt, &options).await
    }

    /// Analyze raw image bytes.
    pub async fn analyze_from_bytes(
        &self,
        bytes: impl AsRef<[u8]>,
        prompt: Option<&str>,
        options: AnalyzeOptions,
    ) -> Result<ImageAnalysisResponse> {
        let encoded = STANDARD.encode(bytes.as_ref());
        self.analyze_source(ImageSource::Base64(encoded), prompt, &options).await
    }

    pub async fn analyze_from_file_id(
        &self,
        file_id: impl Into<String>,
        prompt: Option<&str>,
        options: AnalyzeOptions,
    ) -> Result<ImageAnalysisResponse> {
        self.analyze_source(ImageSource::FileId(file_id.into()), prompt, &options).await
    }

    /// Analyze several images in one request.
    pub async fn compare_images(
        &self,
        images: NonEmpty<ImageSource>,
        prompt: Option<&str>,
        options: AnalyzeOptions,
    ) -> Result<ImageAnalysisResponse> {
        let prompt = prompt.filter(|p| !p.trim().is_empty()).unwrap_or(COMPARE_PROMPT);
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(ContentPart::text(prompt));
        parts.extend(images.iter().map(|source| image_part(source, &options)));

        self.send(parts, &options, &RequestOptions::default())
            .await
            .map_err(|e| with_context(e, "Image comparison failed"))
    }

    /// Single-call form taking a [`VisionRequest`].
    pub async fn create(&self, request: VisionRequest, options: RequestOptions) -> Result<VisionResponse> {
        let analysis = ImageAnalysisRequest {
            image_url: request.image_url,
            image_base64: request.image_base64,
            file_id: request.file_id,
            prompt: Some(request.prompt),
            model: Some(request.model).filter(|m| !m.is_empty()),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            detail: request.detail,
        };
        let response = self.analyze(analysis, options).await?;
        Ok(VisionResponse {
            analysis: response.analysis,
            usage: response.usage,
            request_id: response.request_id,
        })
    }

    /// Responses-style call: the first user message supplies the prompt
    /// (text parts joined by spaces) and the image.
    pub async fn create_response(
        &self,
        request: ResponseCreateRequest,
        options: RequestOptions,
    ) -> Result<ResponseOutput> {
        let user = request
            .input
            .iter()
            .find(|m| m.role == Role::User)
            .ok_or_else(|| ClientError::InvalidRequest("User message is required".to_string()))?;

        let prompt = user
            .content
            .iter()
            .filter_map(|c| match c {
                ResponseInputContent::InputText { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .join(" ");

        let mut analysis = ImageAnalysisRequest {
            prompt: Some(prompt),
            model: Some(request.model.clone()),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            ..Default::default()
        };
        for content in &user.content {
            if let ResponseInputContent::InputImage { image_url, file_id } = content {
                match (image_url, file_id) {
                    (Some(url), _) if url.starts_with("data:") => analysis.image_base64 = Some(url.clone()),
                    (Some(url), _) => analysis.image_url = Some(url.clone()),
                    (None, Some(id)) => analysis.file_id = Some(id.clone()),
                    (None, None) => {}
                }
            }
        }

        let response = self.analyze(analysis, options).await?;
        Ok(ResponseOutput {
            output_text: response.analysis,
            usage: response.usage,
            request_id: response.request_id,
        })
    }

    /// Analyze images one after another, pausing between requests.
    ///
    /// A failed image yields a result with `error` set; the batch continues.
    pub async fn batch_analyze(&self, images: Vec<BatchImage>, options: BatchOptions) -> Vec<BatchResult> {
        let total = images.len();
        let mut results = Vec::with_capacity(total);

        for (index, image) in images.into_iter().enumerate() {
            if index > 0 && options.delay > Duration::ZERO {
                tokio::time::sleep(options.delay).await;
            }
            tracing::debug!("processing image {}/{}", index + 1, total);

            let mut request = ImageAnalysisRequest::from_source(image.source).with_options(&options.analyze);
            request.prompt = image.prompt;

            let result = match self.analyze(request, RequestOptions::default()).await {
                Ok(response) => BatchResult {
                    analysis: response.analysis,
                    usage: response.usage,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("image {}/{} failed: {}", index + 1, total, e);
                    BatchResult {
                        analysis: String::new(),
                        usage: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }

        results
    }

    /// Analyze and ask the model to rate its own confidence (0-100).
    ///
    /// The `[Confidence: NN%]` tag is removed from the returned analysis.
    pub async fn analyze_with_confidence(
        &self,
        mut request: ImageAnalysisRequest,
        options: RequestOptions,
    ) -> Result<ImageAnalysisResponse> {
        let base = request
            .prompt
            .take()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| CONFIDENCE_BASE_PROMPT.to_string());
        request.prompt = Some(format!("{base}{CONFIDENCE_INSTRUCTION}"));

        let mut response = self.analyze(request, options).await?;
        let (analysis, confidence) = extract_confidence(&response.analysis);
        response.analysis = analysis;
        response.confidence = confidence;
        Ok(response)
    }

    async fn analyze_source(
        &self,
        source: ImageSource,
        prompt: Option<&str>,
        options: &AnalyzeOptions,
    ) -> Result<ImageAnalysisResponse> {
        let mut request = ImageAnalysisRequest::from_source(source).with_options(options);
        request.prompt = prompt.map(str::to_string);
        self.analyze(request, RequestOptions::default()).await
    }

    async fn send(
        &self,
        parts: Vec<ContentPart>,
        settings: &AnalyzeOptions,
        options: &RequestOptions,
    ) -> Result<ImageAnalysisResponse> {
        let request = ChatCompletionRequest {
            model: settings
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            messages: vec![ChatMessage::user(parts)],
            max_tokens: Some(settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature: Some(settings.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            stream: None,
            files: None,
        };

        let value = self.client.make_vision_request(&request, options).await?;
        analysis_response(value)
    }
}

fn image_part(source: &ImageSource, settings: &AnalyzeOptions) -> ContentPart {
    ContentPart::image(source.to_url(), settings.detail.unwrap_or_default())
}

fn analysis_response(value: Value) -> Result<ImageAnalysisResponse> {
    let response: ChatCompletionResponse = serde_json::from_value(value)?;
    let analysis = response
        .content()
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_ANALYSIS)
        .to_string();
    Ok(ImageAnalysisResponse {
        analysis,
        usage: response.usage,
        request_id: response.request_id,
        confidence: None,
    })
}

fn with_context(err: ClientError, prefix: &str) -> ClientError {
    match err {
        ClientError::Api(api) => ClientError::Api(api.context(prefix)),
        other => other,
    }
}

/// Split a `[Confidence: NN%]` tag off an analysis.
///
/// Returns the trimmed text without the first well-formed tag, and its value.
pub fn extract_confidence(analysis: &str) -> (String, Option<u32>) {
    let mut from = 0;
    while let Some(offset) = analysis[from..].find(CONFIDENCE_TAG) {
        let start = from + offset;
        let after_tag = &analysis[start + CONFIDENCE_TAG.len()..];
        let number = after_tag.trim_start();
        let digits = number.bytes().take_while(u8::is_ascii_digit).count();

        if digits > 0 && number[digits..].starts_with("%]") {
            let end = start + CONFIDENCE_TAG.len() + (after_tag.len() - number.len()) + digits + 2;
            let cleaned = format!("{}{}", &analysis[..start], &analysis[end..]);
            return (cleaned.trim().to_string(), number[..digits].parse().ok());
        }
        from = start + 1;
    }
    (analysis.trim().to_string(), None)
}
