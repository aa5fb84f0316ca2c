//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::openai::DEFAULT_TIMEOUT_MS;
use super::traits::*;

const API_VERSION: &str = "2023-06-01";

/// Anthropic backend.
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout_ms: u64,
}

impl AnthropicBackend {
    /// Create a backend for the hosted Anthropic API.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ReasoningError> {
        Self::with_base_url("https://api.anthropic.com/v1", model, api_key, DEFAULT_TIMEOUT_MS)
    }

    /// Create a backend against a custom endpoint.
    pub fn with_base_url(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self, ReasoningError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ReasoningError::Unavailable("API key required".to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(API_VERSION),
        );
        let mut key = header::HeaderValue::from_str(&api_key)
            .map_err(|e| ReasoningError::Config(format!("invalid API key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ReasoningError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens: 4096,
            timeout_ms,
        })
    }

    /// Set the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<BodyMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct BodyMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    model: String,
    content: Vec<ContentBlock>,
    usage: Option<UsageReply>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageReply {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl ReasoningProvider for AnthropicBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatResponse, ReasoningError> {
        let body = MessagesBody {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: vec![BodyMessage {
                role: "user",
                content: user_message,
            }],
        };

        debug!(model = %self.model, "Sending messages request");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| error_from_transport(e, self.timeout_ms))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let reply: MessagesReply = response
            .json()
            .await
            .map_err(|e| ReasoningError::ParseError(e.to_string()))?;

        let content = match reply.content.into_iter().next() {
            Some(ContentBlock {
                block_type,
                text: Some(text),
            }) if block_type == "text" => text,
            _ => {
                return Err(ReasoningError::ParseError(
                    "Unexpected response type from model".to_string(),
                ))
            }
        };

        Ok(ChatResponse {
            content,
            model: reply.model,
            usage: reply.usage.map(|u| ChatUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}
