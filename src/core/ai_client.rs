use crate::adapters::providers::{AnthropicProvider, OllamaProvider, OpenAiProvider};
use crate::config::toml_config::AppConfig;
use crate::domain::ports::{GenerationRequest, LlmProvider, VisionRequest};
use crate::utils::error::{FlowError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub default_model: String,
    pub vision_model: String,
    /// 每個 provider 的嘗試次數 (含第一次)
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4-vision-preview".to_string(),
            retry_attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

impl GenerationOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }
}

/// Routes prompts to the configured providers with retry and fallback.
pub struct AiClient {
    providers: Vec<Arc<dyn LlmProvider>>,
    settings: ClientSettings,
}

fn model_or(config_model: &str, provider_matches: bool, family_default: &str) -> String {
    if provider_matches {
        config_model.to_string()
    } else {
        family_default.to_string()
    }
}

impl AiClient {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, settings: ClientSettings) -> Self {
        Self { providers, settings }
    }

    /// 依設定建立 provider；順序 openai → anthropic → ollama 即為備援順序
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let ai = &config.ai;
        let timeout = Duration::from_secs(ai.timeout_seconds);
        let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

        if let Some(key) = ai.openai_key() {
            let model = model_or(&ai.default_model, ai.default_model.starts_with("gpt"), "gpt-3.5-turbo");
            let provider = OpenAiProvider::new(&ai.openai_base_url, key, &model, timeout)?
                .with_vision_model(&ai.vision_model);
            providers.push(Arc::new(provider));
            tracing::info!("🤖 OpenAI client initialized");
        }

        if let Some(key) = ai.anthropic_key() {
            let model = model_or(
                &ai.default_model,
                ai.default_model.starts_with("claude"),
                "claude-3-haiku-20240307",
            );
            providers.push(Arc::new(AnthropicProvider::new(
                &ai.anthropic_base_url,
                key,
                &model,
                timeout,
            )?));
            tracing::info!("🤖 Anthropic client initialized");
        }

        if ai.use_local_models {
            let is_local = !ai.default_model.starts_with("gpt") && !ai.default_model.starts_with("claude");
            let model = model_or(&ai.default_model, is_local, "llama2");
            providers.push(Arc::new(OllamaProvider::new(&ai.ollama_base_url, &model, timeout)?));
            tracing::info!("🤖 Ollama client initialized at {}", ai.ollama_base_url);
        }

        let settings = ClientSettings {
            default_model: ai.default_model.clone(),
            vision_model: ai.vision_model.clone(),
            retry_attempts: ai.retry_attempts.max(1),
            retry_delay: Duration::from_millis(ai.retry_delay_ms),
        };
        Ok(Self::new(providers, settings))
    }

    pub fn is_available(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.kind().to_string()).collect()
    }

    pub fn available_models(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|p| p.supported_models())
            .collect()
    }

    pub fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    /// 第一個是認領該 model 的 provider；其餘以各自的預設 model 作為備援
    fn plan<'a>(
        &'a self,
        model: &str,
        candidates: impl Iterator<Item = &'a Arc<dyn LlmProvider>> + Clone,
        fallback_model: fn(&dyn LlmProvider) -> &str,
    ) -> Vec<(&'a Arc<dyn LlmProvider>, String)> {
        let primary = candidates.clone().position(|p| p.handles_model(model));
        let mut plan = Vec::new();

        if let Some(index) = primary {
            if let Some(provider) = candidates.clone().nth(index) {
                plan.push((provider, model.to_string()));
            }
        }
        for (index, provider) in candidates.enumerate() {
            if Some(index) != primary {
                plan.push((provider, fallback_model(provider.as_ref()).to_string()));
            }
        }
        plan
    }

    async fn with_retry<F, Fut>(&self, provider: &str, mut call: F) -> Result<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let attempts = self.settings.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        "🔄 {} attempt {}/{} failed: {}, retrying in {:?}",
                        provider,
                        attempt,
                        attempts,
                        e,
                        self.settings.retry_delay
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        if self.providers.is_empty() {
            return Err(FlowError::NoProviderAvailable);
        }

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.settings.default_model.clone());
        let mut last_error = None;

        for (provider, model) in self.plan(&model, self.providers.iter(), |p| p.default_model()) {
            let name = provider.kind().to_string();
            let request = GenerationRequest {
                prompt: prompt.to_string(),
                model,
                max_tokens: options.max_tokens,
                temperature: options.temperature,
            };

            match self.with_retry(&name, || provider.generate(&request)).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!("⚠️ {} ({}) failed: {}", name, request.model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(FlowError::NoProviderAvailable))
    }

    /// Sends the image to a vision-capable provider; when none can answer,
    /// falls back to a text-only prompt.
    pub async fn analyze_image(
        &self,
        image: &[u8],
        media_type: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<String> {
        if self.providers.is_empty() {
            return Err(FlowError::NoProviderAvailable);
        }

        let model = model.unwrap_or(&self.settings.vision_model).to_string();
        let image_base64 = STANDARD.encode(image);
        let vision_providers = self.providers.iter().filter(|p| p.supports_vision());

        for (provider, model) in self.plan(&model, vision_providers, |p| p.vision_model()) {
            let name = provider.kind().to_string();
            let request = VisionRequest {
                prompt: prompt.to_string(),
                model,
                image_base64: image_base64.clone(),
                media_type: media_type.to_string(),
                max_tokens: 1000,
            };

            match self.with_retry(&name, || provider.analyze_image(&request)).await {
                Ok(text) => return Ok(text),
                Err(e) => tracing::warn!("⚠️ {} vision ({}) failed: {}", name, request.model, e),
            }
        }

        tracing::info!("🖼️ No vision provider answered, using text-only analysis");
        let fallback_prompt = format!(
            "Based on this prompt about an image: {}\nPlease provide a general analysis assuming this is a product image.",
            prompt
        );
        self.generate_text(&fallback_prompt, &GenerationOptions::default())
            .await
    }
}
