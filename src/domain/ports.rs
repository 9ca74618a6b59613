use crate::domain::model::{BusinessConcept, EvaluationOptions, EvaluationRecord, EvaluationResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Mock => "mock",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub model: String,
    /// Base64 encoded image payload.
    pub image_base64: String,
    pub media_type: String,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn default_model(&self) -> &str;

    fn supported_models(&self) -> Vec<String>;

    /// Whether a model name belongs to this provider's family.
    fn handles_model(&self, model: &str) -> bool;

    fn supports_vision(&self) -> bool {
        false
    }

    /// Model used for image requests when the caller's model belongs elsewhere.
    fn vision_model(&self) -> &str {
        self.default_model()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    async fn analyze_image(&self, request: &VisionRequest) -> Result<String>;
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn insert(&self, id: &str, concept: BusinessConcept, options: EvaluationOptions);
    async fn get(&self, id: &str) -> Result<EvaluationRecord>;
    async fn set_progress(&self, id: &str, progress: u8);
    async fn complete(&self, id: &str, result: EvaluationResult);
    async fn fail(&self, id: &str, message: String);
    async fn list(&self) -> Vec<EvaluationRecord>;
}

#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: u8, phase: &str);
}

/// Sink that drops progress updates; used for one-shot CLI runs.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _progress: u8, _phase: &str) {}
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
