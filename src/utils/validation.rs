use crate::utils::error::{FlowError, Result};
use url::Url;

/// 年齡欄位允許的範圍
pub const AGE_LIMITS: (u32, u32) = (0, 100);

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn config_error(field: &str, value: impl ToString, reason: impl Into<String>) -> FlowError {
    FlowError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

// ---- configuration values ----

/// Provider endpoints must be absolute http(s) URLs.
pub fn validate_base_url(field: &str, raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(config_error(field, raw, "URL cannot be empty"));
    }
    let url = Url::parse(raw).map_err(|e| config_error(field, raw, format!("Invalid URL format: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(config_error(field, raw, format!("Unsupported URL scheme: {}", url.scheme())));
    }
    Ok(())
}

pub fn validate_host(field: &str, host: &str) -> Result<()> {
    if host.trim().is_empty() || host.contains(char::is_whitespace) {
        return Err(config_error(field, host, "Host cannot be empty or contain spaces"));
    }
    Ok(())
}

pub fn validate_at_least(field: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(config_error(field, value, format!("Value must be at least {}", min)));
    }
    Ok(())
}

/// 封存目錄：不可為空或含有 NUL
pub fn validate_archive_dir(field: &str, dir: &str) -> Result<()> {
    if dir.trim().is_empty() {
        return Err(config_error(field, dir, "Path cannot be empty"));
    }
    if dir.contains('\0') {
        return Err(config_error(field, dir.escape_default(), "Path contains null bytes"));
    }
    Ok(())
}

// ---- request fields ----

/// 空字串或只有空白都視為缺少
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FlowError::validation(field, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

/// Both ages inside [`AGE_LIMITS`] and `age_max >= age_min`.
pub fn validate_age_span(age_min: u32, age_max: u32) -> Result<()> {
    let (low, high) = AGE_LIMITS;
    for (field, age) in [
        ("target_demographics.age_min", age_min),
        ("target_demographics.age_max", age_max),
    ] {
        if !(low..=high).contains(&age) {
            return Err(FlowError::validation(
                field,
                format!("Age {} must be between {} and {}", age, low, high),
            ));
        }
    }
    if age_max < age_min {
        return Err(FlowError::validation(
            "target_demographics.age_max",
            "age_max must be greater than or equal to age_min",
        ));
    }
    Ok(())
}

pub fn require_description_or_image(description: Option<&str>, has_image: bool) -> Result<()> {
    let has_description = description.is_some_and(|d| !d.trim().is_empty());
    if !has_description && !has_image {
        return Err(FlowError::validation(
            "product_info.description",
            "Either description or image must be provided",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_urls() {
        assert!(validate_base_url("ai.openai_base_url", "https://api.openai.com").is_ok());
        assert!(validate_base_url("ai.ollama_base_url", "http://localhost:11434").is_ok());
        assert!(validate_base_url("ai.ollama_base_url", "").is_err());
        assert!(validate_base_url("ai.ollama_base_url", "localhost:11434").is_err());
        assert!(validate_base_url("ai.anthropic_base_url", "ftp://api.anthropic.com").is_err());
    }

    #[test]
    fn test_config_numbers_and_paths() {
        assert!(validate_at_least("ai.retry_attempts", 2, 1).is_ok());
        assert!(validate_at_least("ai.retry_attempts", 0, 1).is_err());
        assert!(validate_host("server.host", "0.0.0.0").is_ok());
        assert!(validate_host("server.host", "my host").is_err());
        assert!(validate_archive_dir("output.archive_dir", "./archive").is_ok());
        assert!(validate_archive_dir("output.archive_dir", " ").is_err());
    }

    #[test]
    fn test_age_span_names_the_offending_field() {
        assert!(validate_age_span(25, 45).is_ok());
        assert!(validate_age_span(30, 30).is_ok());

        match validate_age_span(20, 120) {
            Err(FlowError::ValidationError { field, .. }) => assert_eq!(field, "target_demographics.age_max"),
            other => panic!("unexpected: {:?}", other),
        }
        match validate_age_span(50, 40) {
            Err(FlowError::ValidationError { message, .. }) => assert!(message.contains("age_min")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_request_text_fields() {
        assert!(require_text("target_demographics.location", "Austin").is_ok());
        assert!(require_text("concept_description", "   ").is_err());
        assert!(require_description_or_image(Some("Mugs"), false).is_ok());
        assert!(require_description_or_image(None, true).is_ok());
        assert!(require_description_or_image(Some("  "), false).is_err());
    }
}
