use crate::domain::ports::{GenerationRequest, LlmProvider, ProviderKind, VisionRequest};
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

const PROVIDER: &str = "mock";

/// Scripted reply for [`MockProvider`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Non-2xx answer from the provider API.
    Status(u16),
    Timeout,
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }

    fn into_result(self) -> Result<String> {
        match self {
            MockReply::Text(text) => Ok(text),
            MockReply::Status(429) => Err(FlowError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after: None,
            }),
            MockReply::Status(status @ (401 | 403)) => Err(FlowError::ProviderAuthError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}", status),
            }),
            MockReply::Status(status) => Err(FlowError::ProviderApiError {
                provider: PROVIDER.to_string(),
                status,
                message: "scripted failure".to_string(),
            }),
            MockReply::Timeout => Err(FlowError::ProviderTimeout {
                provider: PROVIDER.to_string(),
                seconds: 0,
            }),
        }
    }
}

/// In-process provider for offline runs and tests.
///
/// Replies are taken from the queue first, then from the first rule whose
/// needle occurs in the prompt, then from the fallback text.
pub struct MockProvider {
    models: Vec<String>,
    vision: bool,
    queue: Mutex<VecDeque<MockReply>>,
    rules: Vec<(String, MockReply)>,
    fallback: MockReply,
    prompts: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            models: vec!["mock-model".to_string()],
            vision: false,
            queue: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            fallback: MockReply::text("Mock analysis response"),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        if !models.is_empty() {
            self.models = models.iter().map(|m| m.to_string()).collect();
        }
        self
    }

    pub fn with_vision(mut self, vision: bool) -> Self {
        self.vision = vision;
        self
    }

    pub fn with_rule(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        lock(&self.queue).push_back(reply);
    }

    pub fn remaining_replies(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    fn reply_for(&self, prompt: &str) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());

        if let Some(reply) = lock(&self.queue).pop_front() {
            return reply.into_result();
        }

        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone())
            .into_result()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn default_model(&self) -> &str {
        self.models.first().map(String::as_str).unwrap_or("mock-model")
    }

    fn supported_models(&self) -> Vec<String> {
        self.models.clone()
    }

    fn handles_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.reply_for(&request.prompt)
    }

    async fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        if !self.vision {
            return Err(FlowError::InvalidProviderResponse {
                provider: PROVIDER.to_string(),
                message: "vision disabled".to_string(),
            });
        }
        self.reply_for(&request.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            model: "mock-model".to_string(),
            max_tokens: 100,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_queue_then_rules_then_fallback() {
        let mock = MockProvider::new()
            .with_rule("trends", MockReply::text("1. Remote work"))
            .with_fallback(MockReply::text("default"));
        mock.push_reply(MockReply::text("queued"));

        assert_eq!(mock.generate(&request("trends please")).await.unwrap(), "queued");
        assert_eq!(mock.generate(&request("trends please")).await.unwrap(), "1. Remote work");
        assert_eq!(mock.generate(&request("other")).await.unwrap(), "default");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.remaining_replies(), 0);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mock = MockProvider::new();
        mock.push_reply(MockReply::Status(503));
        mock.push_reply(MockReply::Status(429));

        let err = mock.generate(&request("x")).await.unwrap_err();
        assert!(matches!(err, FlowError::ProviderApiError { status: 503, .. }));
        let err = mock.generate(&request("x")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
