//! OpenAI-compatible chat completion client
//!
//! Works with any provider exposing `POST {base_url}/chat/completions`
//! (OpenAI, Azure OpenAI proxies, LocalAI, vLLM, ...).
//!
//! # Features
//! - Bearer authentication with the key held in a [`SecretString`]
//! - Provider error bodies mapped onto [`ApiError`] variants
//! - Provider messages sanitized before they reach the user
//! - No retries: every failure is reported exactly once

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::time::Duration;

use async_trait::async_trait;
use mcpx_core::{ApiError, ChatMessage, CompletionClient, CompletionParams, Role, Settings};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use url::Url;

pub mod sanitize;

pub use sanitize::sanitize_error_message;

/// OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    endpoint: Url,
    api_key: SecretString,
    http: reqwest::Client,
    timeout_seconds: u64,
}

/// Configuration for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (e.g. "https://api.openai.com/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: SecretString,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: mcpx_core::DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::new("".into()),
            timeout_seconds: mcpx_core::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl From<&Settings> for ClientConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout_seconds: settings.timeout_seconds,
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    /// ID of the model to use
    pub model: &'a str,
    /// List of messages in the conversation
    pub messages: &'a [ChatMessage],
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    /// Build a request from messages and model parameters
    pub fn new(messages: &'a [ChatMessage], params: &'a CompletionParams) -> Self {
        Self {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique ID of the response
    #[serde(default)]
    pub id: String,
    /// Model used for generation
    #[serde(default)]
    pub model: String,
    /// List of generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Text of the first choice
    pub fn first_content(self) -> Result<String, ApiError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ApiError::EmptyResponse)
    }
}

/// Generated choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Index of the choice
    #[serde(default)]
    pub index: i32,
    /// Generated message
    pub message: ResponseMessage,
    /// Reason for finishing (e.g. "stop", "length")
    pub finish_reason: Option<String>,
}

/// Message inside a choice; content is absent for tool-call replies
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Role of the author
    pub role: Role,
    /// Generated text
    pub content: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Provider error body
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Detailed error information
    pub error: ErrorDetail,
}

/// Detailed error information
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Error code
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl OpenAIClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Setup(format!("invalid base_url: {}", e)))?;
        let endpoint = completions_url(&base_url)?;

        // Log the host only, never the key
        info!(
            "Creating OpenAI client for host: {}",
            base_url.host_str().unwrap_or("unknown")
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            endpoint,
            api_key: config.api_key,
            http,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Create a client from loaded settings
    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(ClientConfig::from(settings))
    }

    /// Full URL of the chat completions endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build request headers
    fn build_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();

        let mut auth =
            HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret())).map_err(
                |_| ApiError::Setup("API key contains invalid header characters".to_string()),
            )?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    /// Send a chat completion request
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ApiError> {
        let headers = self.build_headers()?;

        debug!("Sending chat request to {}", self.endpoint);

        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            let chat_response: ChatResponse = serde_json::from_str(&body)
                .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
            info!(
                "Chat completion successful: {} tokens used",
                chat_response
                    .usage
                    .as_ref()
                    .map(|u| u.total_tokens)
                    .unwrap_or(0)
            );
            Ok(chat_response)
        } else {
            // Full body goes to the log only
            error!("API error ({}): {}", status, sanitize_error_message(&body));
            Err(status_error(status, &body))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout_seconds)
        } else if e.is_decode() {
            ApiError::MalformedResponse(sanitize_error_message(&e.to_string()))
        } else {
            ApiError::Network(sanitize_error_message(&e.to_string()))
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn submit(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<String, ApiError> {
        let request = ChatRequest::new(messages, params);
        self.chat(&request).await?.first_content()
    }
}

/// Append `chat/completions` to the base URL without dropping its last segment
///
/// `Url::join` replaces the final segment unless the path ends in `/`:
/// `"v1".join("chat")` is `"chat"`, `"v1/".join("chat")` is `"v1/chat"`.
fn completions_url(base: &Url) -> Result<Url, ApiError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("chat/completions")
        .map_err(|e| ApiError::Setup(format!("invalid base_url: {}", e)))
}

/// Map a non-success status and body onto an [`ApiError`]
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => sanitize_error_message(&parsed.error.message),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(message),
        _ => ApiError::Http {
            status: status.as_u16(),
            message,
        },
    }
}
