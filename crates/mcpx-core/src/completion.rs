//! Chat messages and the completion client capability
//!
//! The runner only needs "submit these messages, get text back". Transport
//! crates implement [`CompletionClient`]; tests substitute a stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Sampling temperature used when none is configured
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Role of the message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Model parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    /// Model identifier
    pub model: String,
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }
}

/// Failures reported by a completion client
///
/// None of these are retried; the runner reports them once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Connection could not be established or was dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not finish within the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Credential rejected (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider throttled the request (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Any other non-success status
    #[error("HTTP error {status}: {message}")]
    Http {
        /// Status code returned by the endpoint
        status: u16,
        /// Sanitized provider message
        message: String,
    },

    /// Body could not be decoded as a chat completion
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Response decoded but carried no generated text
    #[error("No response content")]
    EmptyResponse,

    /// Client could not be constructed
    #[error("Client setup failed: {0}")]
    Setup(String),
}

/// Capability to turn role-tagged messages into generated text
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit messages and return the assistant's text
    async fn submit(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<String, ApiError>;
}
