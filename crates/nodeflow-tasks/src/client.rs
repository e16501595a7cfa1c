use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use nodeflow_core::config::{ProviderConfig, RetryConfig};
use nodeflow_core::error::{NodeflowError, Result};

use crate::files::FileData;
use crate::presets::{build_extra_headers, get_preset};
use crate::retry::with_retry;

/// OpenAI-compatible HTTP client. Works with Groq, OpenAI, Ollama, Together,
/// OpenRouter, or any server exposing the same endpoints.
pub struct ProviderClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
    retry: RetryConfig,
}

// Request types
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub n: u32,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize, Debug)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

pub(crate) fn parse_chat_response(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| NodeflowError::ProviderParse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| NodeflowError::ProviderParse("response contained no content".into()))
}

pub(crate) fn parse_transcription_response(body: &str) -> Result<String> {
    serde_json::from_str::<TranscriptionResponse>(body)
        .map(|r| r.text)
        .map_err(|e| NodeflowError::ProviderParse(e.to_string()))
}

/// The first image as a URL; inline base64 results become PNG data URLs.
pub(crate) fn parse_image_response(body: &str) -> Result<String> {
    let parsed: ImageResponse =
        serde_json::from_str(body).map_err(|e| NodeflowError::ProviderParse(e.to_string()))?;
    let datum = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| NodeflowError::ProviderParse("response contained no images".into()))?;
    match (datum.url, datum.b64_json) {
        (Some(url), _) => Ok(url),
        (None, Some(b64)) => Ok(format!("data:image/png;base64,{}", b64)),
        (None, None) => Err(NodeflowError::ProviderParse("image has no url or data".into())),
    }
}

impl ProviderClient {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let preset = get_preset(&config.name);
        let base_url = match (&config.base_url, &preset) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(preset)) => preset.default_base_url.to_string(),
            (None, None) => return Err(NodeflowError::UnsupportedProvider(config.name.clone())),
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NodeflowError::ProviderRequest(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone().filter(|_| config.has_api_key()),
            headers: build_extra_headers(preset.as_ref(), &config.extra_headers),
            retry: config.retry.clone(),
        })
    }

    /// The underlying HTTP client, shared for file downloads.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req = req.bearer_auth(api_key);
        }
        // Apply extra headers from config (set by presets or user)
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| NodeflowError::ProviderRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(NodeflowError::ProviderRequest(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn send_text(&self, req: RequestBuilder) -> Result<String> {
        self.send(req)
            .await?
            .text()
            .await
            .map_err(|e| NodeflowError::ProviderRequest(e.to_string()))
    }

    /// `POST /chat/completions`, returning the first choice's content.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let url = self.endpoint("chat/completions");
        debug!(model = %request.model, max_tokens = request.max_tokens, "Chat completion request");
        let body = with_retry(&self.retry, "chat", || {
            self.send_text(self.http.post(&url).json(request))
        })
        .await?;
        parse_chat_response(&body)
    }

    /// `POST /audio/speech`, returning the raw audio bytes.
    pub async fn speech(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let url = self.endpoint("audio/speech");
        let url = url.as_str();
        debug!(model = %request.model, voice = %request.voice, "Speech request");
        let bytes = with_retry(&self.retry, "speech", move || async move {
            self.send(self.http.post(url).json(request))
                .await?
                .bytes()
                .await
                .map_err(|e| NodeflowError::ProviderRequest(e.to_string()))
        })
        .await?;
        Ok(bytes.to_vec())
    }

    /// `POST /audio/transcriptions` as a multipart upload.
    pub async fn transcribe(
        &self,
        model: &str,
        file: &FileData,
        language: Option<&str>,
    ) -> Result<String> {
        let url = self.endpoint("audio/transcriptions");
        let url = url.as_str();
        debug!(model, file = %file.name, bytes = file.bytes.len(), "Transcription request");
        let body = with_retry(&self.retry, "transcription", move || async move {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(&file.mime)
                .map_err(|e| NodeflowError::ProviderRequest(e.to_string()))?;
            let mut form = Form::new()
                .part("file", part)
                .text("model", model.to_string())
                .text("response_format", "json")
                .text("temperature", "0");
            if let Some(language) = language {
                form = form.text("language", language.to_string());
            }
            self.send_text(self.http.post(url).multipart(form)).await
        })
        .await?;
        parse_transcription_response(&body)
    }

    /// `POST /images/generations`, returning the first image.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<String> {
        let url = self.endpoint("images/generations");
        debug!(model = %request.model, size = %request.size, "Image generation request");
        let body = with_retry(&self.retry, "image", || {
            self.send_text(self.http.post(&url).json(request))
        })
        .await?;
        parse_image_response(&body)
    }
}
