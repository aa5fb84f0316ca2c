//! Reasoning backend abstraction layer.
//!
//! Provides a trait-based interface over hosted chat models:
//! - OpenAI-compatible (OpenAI, vLLM, Ollama, etc.)
//! - Anthropic Messages API
//! - Mock backend for testing

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{ChatResponse, ChatUsage, ReasoningError, ReasoningProvider};
