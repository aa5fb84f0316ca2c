//! Core traits for reasoning backends.
//!
//! This module defines the `ReasoningProvider` trait consumed by the
//! deliberation agents. Implementations must fail fast rather than hang so
//! the agents' rule-based fallback can engage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agora_core::OracleError;

/// Error types for reasoning operations.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    /// Backend is not available (missing credentials, disabled)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Rate limited by the backend
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No response within the allotted time
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Invalid backend configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ReasoningError> for OracleError {
    fn from(err: ReasoningError) -> Self {
        OracleError::ExternalServiceError(err.to_string())
    }
}

/// Core trait for reasoning providers.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Get the backend identifier (e.g., model name).
    fn id(&self) -> &str;

    /// Check if the backend is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Run one system + user exchange.
    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatResponse, ReasoningError>;
}

/// Response from a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text
    pub content: String,
    /// Model that produced the text
    pub model: String,
    /// Token usage, when reported
    pub usage: Option<ChatUsage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt
    pub input_tokens: u32,
    /// Tokens in the completion
    pub output_tokens: u32,
}

impl ChatUsage {
    /// Get total tokens.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Map a non-success HTTP response to a reasoning error.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ReasoningError {
    let status = response.status();
    if status.as_u16() == 429 {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return ReasoningError::RateLimited { retry_after_ms };
    }
    let body = response.text().await.unwrap_or_default();
    ReasoningError::RequestFailed(format!("HTTP {}: {}", status, body))
}

/// Map a transport error, keeping timeouts distinct.
pub(crate) fn error_from_transport(err: reqwest::Error, timeout_ms: u64) -> ReasoningError {
    if err.is_timeout() {
        ReasoningError::Timeout(timeout_ms)
    } else {
        ReasoningError::NetworkError(err.to_string())
    }
}
