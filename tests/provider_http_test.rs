use anyhow::Result;
use flowco::adapters::providers::{AnthropicProvider, OllamaProvider, OpenAiProvider};
use flowco::config::AppConfig;
use flowco::core::{AiClient, GenerationOptions};
use flowco::domain::ports::{GenerationRequest, LlmProvider, VisionRequest};
use flowco::FlowError;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn request(prompt: &str, model: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        model: model.to_string(),
        max_tokens: 100,
        temperature: 0.7,
    }
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5 }
    })
}

#[tokio::test]
async fn test_openai_chat_completion() -> Result<()> {
    let server = MockServer::start_async().await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(r#"{"model": "gpt-4", "max_tokens": 100}"#);
            then.status(200).json_body(chat_reply("  Score: 82  "));
        })
        .await;

    let provider = OpenAiProvider::new(&server.base_url(), "sk-test", "gpt-3.5-turbo", Duration::from_secs(5))?;
    let text = provider.generate(&request("Rate this concept", "gpt-4")).await?;

    assert_eq!(text, "Score: 82");
    chat_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_openai_vision_sends_data_uri() -> Result<()> {
    let server = MockServer::start_async().await;
    let vision_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("data:image/png;base64,iVBORw0KGgo=")
                .body_contains("image_url");
            then.status(200).json_body(chat_reply("PRODUCT CATEGORY: Kitchenware"));
        })
        .await;

    let provider = OpenAiProvider::new(&server.base_url(), "sk-test", "gpt-3.5-turbo", Duration::from_secs(5))?
        .with_vision_model("gpt-4-vision-preview");
    let text = provider
        .analyze_image(&VisionRequest {
            prompt: "Describe the product".to_string(),
            model: "gpt-4-vision-preview".to_string(),
            image_base64: "iVBORw0KGgo=".to_string(),
            media_type: "image/png".to_string(),
            max_tokens: 1000,
        })
        .await?;

    assert!(text.contains("Kitchenware"));
    vision_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_anthropic_messages_joins_text_blocks() -> Result<()> {
    let server = MockServer::start_async().await;
    let messages_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "ak-test")
                .header("anthropic-version", "2023-06-01");
            then.status(200).json_body(json!({
                "content": [
                    { "type": "text", "text": "First line" },
                    { "type": "tool_use", "id": "t1" },
                    { "type": "text", "text": "Second line" }
                ]
            }));
        })
        .await;

    let provider = AnthropicProvider::new(
        &server.base_url(),
        "ak-test",
        "claude-3-haiku-20240307",
        Duration::from_secs(5),
    )?;
    let text = provider
        .generate(&request("Summarize", "claude-3-haiku-20240307"))
        .await?;

    assert_eq!(text, "First line\nSecond line");
    messages_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_ollama_generate_non_streaming() -> Result<()> {
    let server = MockServer::start_async().await;
    let generate_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body_partial(r#"{"model": "llama2", "stream": false}"#);
            then.status(200)
                .json_body(json!({ "response": "Local answer\n", "eval_count": 42, "done": true }));
        })
        .await;

    let provider = OllamaProvider::new(&server.base_url(), "llama2", Duration::from_secs(5))?;
    let text = provider.generate(&request("Hello", "llama2")).await?;

    assert_eq!(text, "Local answer");
    generate_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_error_statuses_map_to_provider_errors() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").header("authorization", "Bearer bad-key");
            then.status(401).body("invalid api key");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").header("authorization", "Bearer busy-key");
            then.status(429).header("retry-after", "7").body("slow down");
        })
        .await;

    let unauthorized = OpenAiProvider::new(&server.base_url(), "bad-key", "gpt-4", Duration::from_secs(5))?;
    let err = unauthorized.generate(&request("x", "gpt-4")).await.unwrap_err();
    assert!(matches!(err, FlowError::ProviderAuthError { .. }));
    assert!(!err.is_retryable());

    let limited = OpenAiProvider::new(&server.base_url(), "busy-key", "gpt-4", Duration::from_secs(5))?;
    let err = limited.generate(&request("x", "gpt-4")).await.unwrap_err();
    assert!(matches!(err, FlowError::RateLimited { retry_after: Some(7), .. }));
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_missing_content_is_invalid_response() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "done": true }));
        })
        .await;

    let provider = OllamaProvider::new(&server.base_url(), "llama2", Duration::from_secs(5))?;
    let err = provider.generate(&request("x", "llama2")).await.unwrap_err();
    assert!(matches!(err, FlowError::InvalidProviderResponse { .. }));
    Ok(())
}

/// 主要 provider 失敗時重試後轉給下一個 provider
#[tokio::test]
async fn test_client_retries_then_falls_back_to_next_provider() -> Result<()> {
    let openai = MockServer::start_async().await;
    let anthropic = MockServer::start_async().await;

    let failing = openai
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("overloaded");
        })
        .await;
    let backup = anthropic
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .json_body_partial(r#"{"model": "claude-3-haiku-20240307"}"#);
            then.status(200)
                .json_body(json!({ "content": [{ "type": "text", "text": "Backup answer" }] }));
        })
        .await;

    let mut config = AppConfig::default();
    config.ai.openai_api_key = Some("sk-test".to_string());
    config.ai.anthropic_api_key = Some("ak-test".to_string());
    config.ai.openai_base_url = openai.base_url();
    config.ai.anthropic_base_url = anthropic.base_url();
    config.ai.default_model = "gpt-3.5-turbo".to_string();
    config.ai.retry_attempts = 2;
    config.ai.retry_delay_ms = 1;

    let client = AiClient::from_config(&config)?;
    assert_eq!(client.provider_names(), vec!["openai", "anthropic"]);

    let text = client
        .generate_text("Evaluate this", &GenerationOptions::with_max_tokens(50))
        .await?;

    assert_eq!(text, "Backup answer");
    failing.assert_hits_async(2).await;
    backup.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_client_without_providers_reports_unavailable() {
    let client = AiClient::from_config(&AppConfig::default()).unwrap();
    assert!(!client.is_available());

    let err = client
        .generate_text("anything", &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::NoProviderAvailable));
}
