use super::{build_http_client, check_status, invalid_response, map_send_error, trim_base_url};
use crate::config::toml_config::ANTHROPIC_MODELS;
use crate::domain::ports::{GenerationRequest, LlmProvider, ProviderKind, VisionRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// Messages API client (`POST /v1/messages`).
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    default_model: String,
    http_client: Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(base_url: &str, api_key: &str, default_model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            api_key: api_key.to_string(),
            default_model: default_model.to_string(),
            http_client: build_http_client(timeout)?,
            timeout,
        })
    }

    async fn send_messages(&self, request: MessagesRequest) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!("🤖 anthropic: model={} url={}", request.model, url);

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(PROVIDER, self.timeout, e))?;

        let response = check_status(PROVIDER, response).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("JSON parse error: {}", e)))?;

        // 只取 text block，忽略其他種類
        let text: Vec<String> = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(invalid_response(PROVIDER, "No text content in response"));
        }
        Ok(text.join("\n").trim().to_string())
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supported_models(&self) -> Vec<String> {
        ANTHROPIC_MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn handles_model(&self, model: &str) -> bool {
        model.starts_with("claude")
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let messages = MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            messages: vec![Message {
                role: "user",
                content: json!(request.prompt),
            }],
        };
        self.send_messages(messages).await
    }

    async fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        let messages = MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: None,
            messages: vec![Message {
                role: "user",
                content: json!([
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": request.media_type,
                            "data": request.image_base64
                        }
                    },
                    { "type": "text", "text": request.prompt }
                ]),
            }],
        };
        self.send_messages(messages).await
    }
}
