// LLM provider clients. 每個 provider 只負責 HTTP 協定；路由與重試在 core::ai_client
pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use mock::{MockProvider, MockReply};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::utils::error::{FlowError, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(FlowError::HttpError)
}

/// 把 reqwest 傳送階段的錯誤轉成 provider 錯誤
pub(crate) fn map_send_error(provider: &str, timeout: Duration, error: reqwest::Error) -> FlowError {
    if error.is_timeout() {
        tracing::error!("⏱️ {} request timed out after {:?}", provider, timeout);
        FlowError::ProviderTimeout {
            provider: provider.to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        tracing::error!("📡 {} request error: {}", provider, error);
        FlowError::HttpError(error)
    }
}

/// 非 2xx 回應對應到錯誤種類；成功時原樣回傳
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    tracing::error!("📡 {} API returned error status {}: {}", provider, status, body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FlowError::ProviderAuthError {
            provider: provider.to_string(),
            message: body,
        },
        StatusCode::TOO_MANY_REQUESTS => FlowError::RateLimited {
            provider: provider.to_string(),
            retry_after,
        },
        _ => FlowError::ProviderApiError {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: body,
        },
    })
}

pub(crate) fn invalid_response(provider: &str, message: impl Into<String>) -> FlowError {
    FlowError::InvalidProviderResponse {
        provider: provider.to_string(),
        message: message.into(),
    }
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(trim_base_url("https://api.openai.com"), "https://api.openai.com");
    }

    #[test]
    fn test_invalid_response_is_provider_category() {
        let err = invalid_response("ollama", "empty body");
        assert_eq!(err.category(), crate::utils::error::ErrorCategory::Provider);
        assert!(!err.is_retryable());
    }
}
