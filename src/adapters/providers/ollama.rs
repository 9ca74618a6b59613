use super::{build_http_client, check_status, invalid_response, map_send_error, trim_base_url};
use crate::config::toml_config::OLLAMA_MODELS;
use crate::domain::ports::{GenerationRequest, LlmProvider, ProviderKind, VisionRequest};
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "ollama";

/// Local Ollama server (`POST /api/generate`, non-streaming).
pub struct OllamaProvider {
    base_url: String,
    default_model: String,
    http_client: Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

impl OllamaProvider {
    pub fn new(base_url: &str, default_model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            default_model: default_model.to_string(),
            http_client: build_http_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supported_models(&self) -> Vec<String> {
        OLLAMA_MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn handles_model(&self, model: &str) -> bool {
        // 允許 "llama2:13b" 這類 tag
        let family = model.split(':').next().unwrap_or(model);
        OLLAMA_MODELS.contains(&family)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!("🤖 ollama: model={} url={}", request.model, url);

        let body = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(PROVIDER, self.timeout, e))?;

        let response = check_status(PROVIDER, response).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("JSON parse error: {}", e)))?;

        if let Some(count) = parsed.eval_count {
            tracing::debug!("🤖 ollama: eval_count={}", count);
        }

        parsed
            .response
            .map(|text| text.trim().to_string())
            .ok_or_else(|| invalid_response(PROVIDER, "Missing 'response' field"))
    }

    async fn analyze_image(&self, _request: &VisionRequest) -> Result<String> {
        Err(FlowError::InvalidProviderResponse {
            provider: PROVIDER.to_string(),
            message: "Image analysis is not supported by local models".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_tagged_models() {
        let p = OllamaProvider::new("http://localhost:11434", "llama2", Duration::from_secs(5)).unwrap();
        assert!(p.handles_model("llama2"));
        assert!(p.handles_model("mistral:7b"));
        assert!(!p.handles_model("gpt-4"));
        assert!(!p.supports_vision());
    }

    #[test]
    fn test_request_carries_options() {
        let body = GenerateRequest {
            model: "mistral",
            prompt: "hi",
            stream: false,
            options: GenerateOptions {
                num_predict: 256,
                temperature: 0.25,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["options"]["num_predict"], 256);
        assert_eq!(value["stream"], false);
    }
}
