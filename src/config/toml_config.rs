use crate::utils::error::{FlowError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const OPENAI_MODELS: [&str; 4] = ["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo", "gpt-4-vision-preview"];
pub const ANTHROPIC_MODELS: [&str; 3] = [
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];
pub const OLLAMA_MODELS: [&str; 3] = ["llama2", "mistral", "codellama"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ai: AiConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub monitor: bool,
    /// 記憶體中保留的評估數量上限，0 表示不限制
    pub max_stored_evaluations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 12000,
            monitor: false,
            max_stored_evaluations: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub default_model: String,
    pub vision_model: String,
    pub use_local_models: bool,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub ollama_base_url: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            default_model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4-vision-preview".to_string(),
            use_local_models: false,
            openai_base_url: "https://api.openai.com".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            timeout_seconds: 60,
            retry_attempts: 2,
            retry_delay_ms: 500,
        }
    }
}

impl AiConfig {
    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn anthropic_key(&self) -> Option<&str> {
        self.anthropic_api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_image_size: usize,
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_image_size: 5 * 1024 * 1024,
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 設定後，完成的評估結果會以 `<id>.json` 寫入此目錄
    pub archive_dir: Option<String>,
    pub model_version: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            archive_dir: None,
            model_version: "1.0.0".to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FlowError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| FlowError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENAI_API_KEY})
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 依序套用環境變數覆蓋；lookup 可在測試中替換
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(key);
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = Some(key);
        }
        if let Some(model) = get("DEFAULT_AI_MODEL") {
            self.ai.default_model = model;
        }
        if let Some(flag) = get("USE_LOCAL_MODELS") {
            self.ai.use_local_models = flag.eq_ignore_ascii_case("true");
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.ai.ollama_base_url = url;
        }
        if let Some(host) = get("WEB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("WEB_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid WEB_PORT value: {}", port),
            }
        }
        if let Some(size) = get("MAX_IMAGE_SIZE") {
            match size.parse() {
                Ok(size) => self.processing.max_image_size = size,
                Err(_) => tracing::warn!("Ignoring invalid MAX_IMAGE_SIZE value: {}", size),
            }
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_host("server.host", &self.server.host)?;

        validation::validate_base_url("ai.openai_base_url", &self.ai.openai_base_url)?;
        validation::validate_base_url("ai.anthropic_base_url", &self.ai.anthropic_base_url)?;
        if self.ai.use_local_models {
            validation::validate_base_url("ai.ollama_base_url", &self.ai.ollama_base_url)?;
        }

        validation::validate_at_least("ai.retry_attempts", self.ai.retry_attempts as usize, 1)?;
        validation::validate_at_least("ai.timeout_seconds", self.ai.timeout_seconds as usize, 1)?;
        validation::validate_at_least("processing.max_image_size", self.processing.max_image_size, 1024)?;

        if let Some(dir) = &self.output.archive_dir {
            validation::validate_archive_dir("output.archive_dir", dir)?;
        }

        Ok(())
    }

    pub fn has_ai_provider(&self) -> bool {
        self.ai.openai_key().is_some() || self.ai.anthropic_key().is_some() || self.ai.use_local_models
    }

    pub fn available_models(&self) -> Vec<String> {
        let mut models = Vec::new();
        if self.ai.openai_key().is_some() {
            models.extend(OPENAI_MODELS.iter().map(|m| m.to_string()));
        }
        if self.ai.anthropic_key().is_some() {
            models.extend(ANTHROPIC_MODELS.iter().map(|m| m.to_string()));
        }
        if self.ai.use_local_models {
            models.extend(OLLAMA_MODELS.iter().map(|m| m.to_string()));
        }
        models
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 12000);
        assert_eq!(config.ai.default_model, "gpt-3.5-turbo");
        assert_eq!(config.processing.max_image_size, 5_242_880);
        assert!(!config.has_ai_provider());
        assert!(config.available_models().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[server]
port = 8080

[ai]
anthropic_api_key = "sk-ant-test"
default_model = "claude-3-haiku-20240307"
retry_attempts = 3
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.ai.retry_attempts, 3);
        assert!(config.has_ai_provider());
        assert_eq!(config.available_models().len(), 3);
        assert!(config.available_models()[0].starts_with("claude"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FLOWCO_TEST_OPENAI_KEY", "sk-from-env");

        let toml_content = r#"
[ai]
openai_api_key = "${FLOWCO_TEST_OPENAI_KEY}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.ai.openai_api_key.as_deref(), Some("sk-from-env"));

        std::env::remove_var("FLOWCO_TEST_OPENAI_KEY");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-override"),
            ("USE_LOCAL_MODELS", "TRUE"),
            ("WEB_PORT", "9000"),
            ("MAX_IMAGE_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.ai.openai_key(), Some("sk-override"));
        assert!(config.ai.use_local_models);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.processing.max_image_size, 5_242_880);
        assert_eq!(config.available_models().len(), 7);
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[ai]
use_local_models = true
ollama_base_url = "invalid-url"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[ai]\nretry_attempts = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_reports_parse_error() {
        let err = AppConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, FlowError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[output]
archive_dir = "./archive"
model_version = "2.0.0"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output.archive_dir.as_deref(), Some("./archive"));
        assert_eq!(config.output.model_version, "2.0.0");
    }
}
