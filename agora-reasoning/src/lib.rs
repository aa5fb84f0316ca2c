//! Agora Reasoning - hosted model backends for deliberation agents
//!
//! Agents consume a single capability, `chat(system, user)`, and treat any
//! failure as a signal to fall back to their rule-based evaluators.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          ReasoningConfig                │
//! │  (provider detection, construction)     │
//! └────────────────┬────────────────────────┘
//!                  │ build()
//!      ┌───────────┼───────────────┐
//!      ▼           ▼               ▼
//! ┌──────────┐ ┌──────────┐ ┌──────────┐
//! │Anthropic │ │ OpenAI   │ │  Mock    │
//! │ Backend  │ │ Backend  │ │ Backend  │
//! └──────────┘ └──────────┘ └──────────┘
//! ```

pub mod backend;
pub mod config;

pub use backend::traits::{ChatResponse, ChatUsage, ReasoningError, ReasoningProvider};
pub use backend::{AnthropicBackend, MockBackend, OpenAiBackend};
pub use config::{ProviderKind, ReasoningConfig};
