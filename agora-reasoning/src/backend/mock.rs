//! Mock reasoning backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::*;

/// Mock backend for testing.
///
/// Returns a fixed response, or a queue of scripted responses consumed in
/// order, with optional artificial latency.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    response_content: String,
    scripted: Mutex<VecDeque<String>>,
    delay: Option<Duration>,
    call_count: AtomicU32,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            response_content: "Mock response".to_string(),
            scripted: Mutex::new(VecDeque::new()),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the response content.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    /// Queue responses returned before falling back to the fixed one.
    pub fn with_script<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(responses.into_iter().map(Into::into));
        }
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Delay every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times chat was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Reset the call count.
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    fn next_content(&self) -> String {
        self.scripted
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.pop_front())
            .unwrap_or_else(|| self.response_content.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl ReasoningProvider for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatResponse, ReasoningError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(ReasoningError::Unavailable("Mock backend disabled".to_string()));
        }

        let content = self.next_content();

        // Estimate token counts
        let input_tokens = (system_prompt.len() + user_message.len()) as u32 / 4;
        let output_tokens = content.len() as u32 / 4;

        Ok(ChatResponse {
            content,
            model: self.model_id.clone(),
            usage: Some(ChatUsage {
                input_tokens,
                output_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend() {
        let backend = MockBackend::new("test-model").with_response("Hello, world!");

        assert!(backend.is_available().await);
        assert_eq!(backend.call_count(), 0);

        let response = backend.chat("sys", "Hi").await.unwrap();

        assert_eq!(response.content, "Hello, world!");
        assert_eq!(response.model, "test-model");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_script_then_fixed() {
        let backend = MockBackend::default()
            .with_response("fixed")
            .with_script(["first", "second"]);

        assert_eq!(backend.chat("", "").await.unwrap().content, "first");
        assert_eq!(backend.chat("", "").await.unwrap().content, "second");
        assert_eq!(backend.chat("", "").await.unwrap().content, "fixed");
        backend.reset_call_count();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let backend = MockBackend::new("test-model").with_available(false);

        assert!(!backend.is_available().await);
        assert!(backend.chat("sys", "Hi").await.is_err());
    }
}
