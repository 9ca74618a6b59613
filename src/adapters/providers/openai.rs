use super::{build_http_client, check_status, invalid_response, map_send_error, trim_base_url};
use crate::config::toml_config::OPENAI_MODELS;
use crate::domain::ports::{GenerationRequest, LlmProvider, ProviderKind, VisionRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

const PROVIDER: &str = "openai";

/// Chat Completions API client (`POST /v1/chat/completions`).
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    default_model: String,
    vision_model: String,
    http_client: Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    // 純文字為字串，視覺請求為 content parts 陣列
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, default_model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            api_key: api_key.to_string(),
            default_model: default_model.to_string(),
            vision_model: "gpt-4-vision-preview".to_string(),
            http_client: build_http_client(timeout)?,
            timeout,
        })
    }

    pub fn with_vision_model(mut self, model: &str) -> Self {
        self.vision_model = model.to_string();
        self
    }

    async fn send_chat(&self, request: ChatRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!("🤖 openai: model={} url={}", request.model, url);

        let start = Instant::now();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(PROVIDER, self.timeout, e))?;

        let response = check_status(PROVIDER, response).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("JSON parse error: {}", e)))?;

        if let Some(usage) = &body.usage {
            tracing::debug!(
                "🤖 openai: prompt_tokens={}, completion_tokens={}, took {:.2}s",
                usage.prompt_tokens,
                usage.completion_tokens,
                start.elapsed().as_secs_f64()
            );
        }

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| invalid_response(PROVIDER, "No content in response"))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supported_models(&self) -> Vec<String> {
        OPENAI_MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn handles_model(&self, model: &str) -> bool {
        model.starts_with("gpt-") || OPENAI_MODELS.contains(&model)
    }

    fn supports_vision(&self) -> bool {
        true
    }

    fn vision_model(&self) -> &str {
        &self.vision_model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let chat = ChatRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: json!(request.prompt),
            }],
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
        };
        self.send_chat(chat).await
    }

    async fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        let data_uri = format!("data:{};base64,{}", request.media_type, request.image_base64);
        let chat = ChatRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: json!([
                    { "type": "text", "text": request.prompt },
                    { "type": "image_url", "image_url": { "url": data_uri } }
                ]),
            }],
            max_tokens: request.max_tokens,
            temperature: None,
        };
        self.send_chat(chat).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new("https://api.openai.com/", "sk-test", "gpt-3.5-turbo", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_model_routing() {
        let p = provider();
        assert!(p.handles_model("gpt-4"));
        assert!(p.handles_model("gpt-4o-mini"));
        assert!(!p.handles_model("claude-3-haiku-20240307"));
        assert!(p.supports_vision());
        assert_eq!(p.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_text_request_shape() {
        let chat = ChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: json!("hello"),
            }],
            max_tokens: 100,
            temperature: Some(0.5),
        };
        let value = serde_json::to_value(&chat).unwrap();
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["max_tokens"], 100);
    }
}
