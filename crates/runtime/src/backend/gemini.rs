//! Google Gemini backend.
//!
//! Streaming uses `streamGenerateContent` with server-sent events: every
//! `data:` line carries a partial response holding the next piece of text.

use super::{ChatBackend, ChatRequest, ChatResponse, Connector, TextSink, Usage};
use crate::settings::Settings;
use crate::{Error, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Option<&'static str>, text: &str) -> Self {
        Self {
            role,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: ApiUsage,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ApiResponse {
    /// Text of the first candidate, parts concatenated. May be empty.
    fn take_text(&mut self) -> Result<String> {
        if let Some(err) = self.error.take() {
            return Err(Error::Api(err.message));
        }
        Ok(self
            .candidates
            .drain(..)
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default())
    }

    fn into_text(mut self) -> Result<String> {
        let text = self.take_text()?;
        if text.trim().is_empty() {
            return Err(no_response());
        }
        Ok(text)
    }

    fn usage(&self) -> Usage {
        Usage {
            input_tokens: self.usage_metadata.prompt_token_count,
            output_tokens: self.usage_metadata.candidates_token_count,
        }
    }
}

fn no_response() -> Error {
    Error::Api("no response from Gemini".into())
}

/// Splits a `text/event-stream` body into `data:` payloads.
///
/// Bytes are buffered until a full line is present, so a chunk boundary
/// inside a line or a multibyte character is harmless.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(newline) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            payloads.extend(data_payload(&line));
        }
        payloads
    }

    /// A last line the server did not terminate.
    fn finish(self) -> Option<String> {
        data_payload(&self.buf)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim_end().strip_prefix("data:")?.trim_start();
    (!data.is_empty()).then(|| data.to_string())
}

/// Parse one streamed chunk, hand its text to the sink and keep the latest
/// usage. Returns whether any text was delivered.
fn deliver_chunk(data: &str, usage: &mut Usage, on_text: TextSink<'_>) -> Result<bool> {
    let mut chunk: ApiResponse = serde_json::from_str(data)
        .map_err(|e| Error::Api(format!("malformed stream chunk: {e}")))?;
    let text = chunk.take_text()?;

    let latest = chunk.usage();
    usage.input_tokens = usage.input_tokens.max(latest.input_tokens);
    usage.output_tokens = usage.output_tokens.max(latest.output_tokens);

    if text.is_empty() {
        return Ok(false);
    }
    on_text(text.as_str());
    Ok(true)
}

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
    client: Option<reqwest::Client>,
}

impl GeminiBackendBuilder {
    /// Create a new builder with an API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            client: None,
        }
    }

    /// Set the maximum tokens for responses.
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Point the backend at a different API root.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a preconfigured HTTP client instead of the default one.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the backend.
    pub fn build(self) -> Result<GeminiBackend> {
        let client = match self.client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?,
        };
        Ok(GeminiBackend {
            client,
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            max_output_tokens: self.max_output_tokens,
        })
    }
}

/// Gemini backend: `generateContent` for whole replies,
/// `streamGenerateContent` for streamed ones.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
}

impl GeminiBackend {
    /// Create a builder for the Gemini backend.
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key, model)
    }

    fn endpoint(&self, method: &str) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/models/{model}:{method}", self.base_url)
    }

    async fn send(&self, url: String, body: &ApiRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }
        Ok(response)
    }

    fn build_request(&self, request: ChatRequest<'_>) -> ApiRequest {
        let mut contents = Vec::with_capacity(request.history.len() * 2 + 1);
        for pair in request.history {
            contents.push(Content::new(Some("user"), &pair.question));
            contents.push(Content::new(Some("model"), &pair.answer));
        }
        contents.push(Content::new(Some("user"), request.question));

        ApiRequest {
            contents,
            system_instruction: request.system.map(|s| Content::new(None, s)),
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl ChatBackend for GeminiBackend {
    async fn chat_stream(&self, request: ChatRequest<'_>, on_text: TextSink<'_>) -> Result<Usage> {
        let api_request = self.build_request(request);
        tracing::debug!(
            backend = %self,
            turns = request.history.len(),
            "streaming chat request"
        );

        let response = self
            .send(self.endpoint("streamGenerateContent?alt=sse"), &api_request)
            .await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut usage = Usage::default();
        let mut received = false;
        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(|e| Error::Network(e.to_string()))?;
            for data in decoder.push(&bytes) {
                received |= deliver_chunk(&data, &mut usage, &mut *on_text)?;
            }
        }
        if let Some(data) = decoder.finish() {
            received |= deliver_chunk(&data, &mut usage, &mut *on_text)?;
        }

        if !received {
            return Err(no_response());
        }
        Ok(usage)
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        let api_request = self.build_request(request);
        tracing::debug!(
            backend = %self,
            turns = request.history.len(),
            "sending chat request"
        );

        let response = self
            .send(self.endpoint("generateContent"), &api_request)
            .await?;
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let usage = api_response.usage();
        let content = api_response.into_text()?;

        Ok(ChatResponse { content, usage })
    }
}

/// Connects a [`GeminiBackend`] from skill settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiConnector;

impl Connector for GeminiConnector {
    type Backend = GeminiBackend;

    fn connect(&self, settings: &Settings) -> Result<GeminiBackend> {
        let api_key = settings.api_key().ok_or(Error::NotConfigured)?;
        GeminiBackend::builder(api_key, &settings.model).build()
    }
}
