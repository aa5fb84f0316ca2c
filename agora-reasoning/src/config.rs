//! Provider selection and construction.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::backend::openai::DEFAULT_TIMEOUT_MS;
use crate::backend::{AnthropicBackend, OpenAiBackend, ReasoningError, ReasoningProvider};

/// Hosted provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    /// Infer the provider from an API key prefix. Unknown prefixes default to Anthropic.
    pub fn detect(api_key: &str) -> Self {
        if api_key.starts_with("sk-ant-") {
            Self::Anthropic
        } else if api_key.starts_with("sk-") {
            Self::OpenAi
        } else {
            Self::Anthropic
        }
    }

    /// Default model for the provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
        }
    }
}

/// Configuration for a reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Provider family
    pub provider: ProviderKind,
    /// Model name
    pub model: String,
    /// API key (never serialized)
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Override of the provider's base URL
    pub base_url: Option<String>,
    /// Completion token limit
    pub max_tokens: u32,
    /// Request timeout (ms)
    pub timeout_ms: u64,
}

impl ReasoningConfig {
    /// Config for a key, with provider detected from its prefix.
    pub fn from_key(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let provider = ProviderKind::detect(&api_key);
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: Some(api_key),
            base_url: None,
            max_tokens: 4096,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Read `ANTHROPIC_API_KEY` or `OPENAI_API_KEY` (Anthropic preferred).
    ///
    /// `AGORA_REASONING_MODEL` overrides the model. Returns `None` when no
    /// key is set, in which case agents run rule-based only.
    pub fn from_env() -> Option<Self> {
        let (key, provider) = if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            (key, ProviderKind::Anthropic)
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            (key, ProviderKind::OpenAi)
        } else {
            return None;
        };
        if key.is_empty() {
            return None;
        }

        let mut config = Self::from_key(key).with_provider(provider);
        if let Ok(model) = std::env::var("AGORA_REASONING_MODEL") {
            config.model = model;
        }
        Some(config)
    }

    /// Force a provider, resetting the model to its default.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        if self.provider != provider {
            self.model = provider.default_model().to_string();
        }
        self.provider = provider;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Build the configured provider.
    pub fn build(&self) -> Result<Arc<dyn ReasoningProvider>, ReasoningError> {
        let key = self
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ReasoningError::Unavailable("API key required".to_string()))?;

        info!(provider = ?self.provider, model = %self.model, "Building reasoning provider");

        match self.provider {
            ProviderKind::Anthropic => {
                let base_url = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());
                let backend =
                    AnthropicBackend::with_base_url(base_url, &self.model, key, self.timeout_ms)?
                        .with_max_tokens(self.max_tokens);
                Ok(Arc::new(backend))
            }
            ProviderKind::OpenAi => {
                let base_url = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
                let backend =
                    OpenAiBackend::with_timeout(base_url, &self.model, Some(key), self.timeout_ms)?
                        .with_max_tokens(self.max_tokens);
                Ok(Arc::new(backend))
            }
        }
    }
}
