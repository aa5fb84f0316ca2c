//! OpenAI-compatible reasoning backend.
//!
//! Works with any OpenAI-compatible chat completions API including:
//! - OpenAI API
//! - vLLM
//! - Ollama

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::traits::*;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// OpenAI-compatible backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    timeout_ms: u64,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ReasoningError> {
        Self::with_timeout(base_url, model, api_key, DEFAULT_TIMEOUT_MS)
    }

    /// Create a backend whose requests give up after `timeout_ms`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, ReasoningError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ReasoningError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens: 4096,
            timeout_ms,
        })
    }

    /// Create a backend for the hosted OpenAI API.
    pub fn openai(model: &str, api_key: impl Into<String>) -> Result<Self, ReasoningError> {
        Self::new("https://api.openai.com/v1", model, Some(api_key.into()))
    }

    /// Create a backend pointing to a local vLLM server.
    pub fn vllm(port: u16, model: &str) -> Result<Self, ReasoningError> {
        Self::new(format!("http://localhost:{}/v1", port), model, None)
    }

    /// Set the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<BodyMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct BodyMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<UsageReply>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageReply {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl ReasoningProvider for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);

        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
        }

        request
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatResponse, ReasoningError> {
        let body = CompletionBody {
            model: &self.model,
            messages: vec![
                BodyMessage {
                    role: "system",
                    content: system_prompt,
                },
                BodyMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let mut http_request = self.client.post(self.chat_completions_url());
        if let Some(auth) = self.auth_header() {
            http_request = http_request.header(header::AUTHORIZATION, auth);
        }

        debug!(model = %self.model, "Sending chat completion");

        let response = http_request
            .json(&body)
            .send()
            .await
            .map_err(|e| error_from_transport(e, self.timeout_ms))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let reply: CompletionReply = response
            .json()
            .await
            .map_err(|e| ReasoningError::ParseError(e.to_string()))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ReasoningError::ParseError("Empty response from model".to_string()))?;

        Ok(ChatResponse {
            content,
            model: reply.model.unwrap_or_else(|| self.model.clone()),
            usage: reply.usage.map(|u| ChatUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_vllm_creation() {
        let backend = OpenAiBackend::vllm(8000, "llama-3.3-70b").unwrap();
        assert_eq!(backend.id(), "llama-3.3-70b");
        assert_eq!(backend.chat_completions_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_chat_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o",
                "choices": [{"message": {"content": "{\"stance\": \"support\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5}
            })))
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(format!("{}/v1", server.uri()), "gpt-4o", Some("sk-test".into()))
                .unwrap();
        let response = backend.chat("system", "user").await.unwrap();

        assert_eq!(response.content, "{\"stance\": \"support\"}");
        assert_eq!(response.model, "gpt-4o");
        assert_eq!(response.usage.unwrap().total(), 17);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(format!("{}/v1", server.uri()), "gpt-4o", None).unwrap();
        let err = backend.chat("system", "user").await.unwrap_err();

        assert!(matches!(
            err,
            ReasoningError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_content_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(server.uri(), "gpt-4o", None).unwrap();
        let err = backend.chat("system", "user").await.unwrap_err();
        assert!(matches!(err, ReasoningError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let backend = OpenAiBackend::with_timeout(server.uri(), "gpt-4o", None, 50).unwrap();
        let err = backend.chat("system", "user").await.unwrap_err();
        assert!(matches!(err, ReasoningError::Timeout(50)));
    }
}
