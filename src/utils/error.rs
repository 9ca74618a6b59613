use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("PDF rendering failed: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid input for {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("{provider} API error ({status}): {message}")]
    ProviderApiError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} rejected the credentials: {message}")]
    ProviderAuthError { provider: String, message: String },

    #[error("{provider} rate limit exceeded")]
    RateLimited {
        provider: String,
        retry_after: Option<u64>,
    },

    #[error("{provider} request timed out after {seconds}s")]
    ProviderTimeout { provider: String, seconds: u64 },

    #[error("Invalid response from {provider}: {message}")]
    InvalidProviderResponse { provider: String, message: String },

    #[error("No AI provider available. Configure an API key or enable local models")]
    NoProviderAvailable,

    #[error("Evaluation not found: {id}")]
    EvaluationNotFound { id: String },

    #[error("Evaluation {id} is still in progress")]
    EvaluationInProgress { id: String },

    #[error("Evaluation {id} is not completed")]
    EvaluationNotCompleted { id: String },

    #[error("Evaluation {id} failed: {message}")]
    EvaluationFailed { id: String, message: String },

    #[error("Unsupported report format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Provider,
    Network,
    NotFound,
    State,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 根據錯誤嚴重程度決定 CLI 退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 4,      // 輸入錯誤
            ErrorSeverity::Medium => 2,   // 可重試錯誤
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        }
    }
}

impl FlowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        FlowError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::MissingConfigError { .. }
            | FlowError::InvalidConfigValueError { .. }
            | FlowError::ConfigValidationError { .. }
            | FlowError::NoProviderAvailable => ErrorCategory::Configuration,
            FlowError::ValidationError { .. }
            | FlowError::PayloadTooLarge { .. }
            | FlowError::UnsupportedFormat { .. } => ErrorCategory::Validation,
            FlowError::ProviderApiError { .. }
            | FlowError::ProviderAuthError { .. }
            | FlowError::RateLimited { .. }
            | FlowError::InvalidProviderResponse { .. } => ErrorCategory::Provider,
            FlowError::HttpError(_) | FlowError::ProviderTimeout { .. } => ErrorCategory::Network,
            FlowError::EvaluationNotFound { .. } => ErrorCategory::NotFound,
            FlowError::EvaluationInProgress { .. }
            | FlowError::EvaluationNotCompleted { .. }
            | FlowError::EvaluationFailed { .. } => ErrorCategory::State,
            FlowError::ZipError(_) | FlowError::PdfError(_) | FlowError::SerializationError(_) => {
                ErrorCategory::Output
            }
            FlowError::IoError(_) | FlowError::ProcessingError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::NotFound | ErrorCategory::State => {
                ErrorSeverity::Low
            }
            ErrorCategory::Network | ErrorCategory::Provider => ErrorSeverity::Medium,
            ErrorCategory::Output | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 是否值得對同一個 provider 重試
    pub fn is_retryable(&self) -> bool {
        match self {
            FlowError::HttpError(e) => e.is_timeout() || e.is_connect(),
            FlowError::ProviderApiError { status, .. } => *status >= 500,
            FlowError::RateLimited { .. } | FlowError::ProviderTimeout { .. } => true,
            _ => false,
        }
    }

    /// HTTP status used when the error reaches the REST layer.
    pub fn status_code(&self) -> u16 {
        match self {
            FlowError::ValidationError { .. }
            | FlowError::UnsupportedFormat { .. }
            | FlowError::EvaluationNotCompleted { .. } => 400,
            FlowError::EvaluationNotFound { .. } => 404,
            FlowError::PayloadTooLarge { .. } => 413,
            FlowError::EvaluationInProgress { .. } => 202,
            FlowError::NoProviderAvailable => 503,
            FlowError::ProviderApiError { .. }
            | FlowError::ProviderAuthError { .. }
            | FlowError::RateLimited { .. }
            | FlowError::ProviderTimeout { .. }
            | FlowError::InvalidProviderResponse { .. }
            | FlowError::HttpError(_) => 502,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            FlowError::MissingConfigError { field } => {
                format!("Set '{}' in the config file or environment", field)
            }
            FlowError::InvalidConfigValueError { field, .. }
            | FlowError::ConfigValidationError { field, .. } => {
                format!("Check the value of '{}' in your configuration", field)
            }
            FlowError::ValidationError { field, .. } => {
                format!("Correct the '{}' field and submit again", field)
            }
            FlowError::PayloadTooLarge { limit } => {
                format!("Send a smaller image; the request must stay under {} bytes", limit)
            }
            FlowError::ProviderAuthError { provider, .. } => {
                format!("Verify the {} API key", provider)
            }
            FlowError::RateLimited { retry_after, .. } => match retry_after {
                Some(seconds) => format!("Wait {} seconds before retrying", seconds),
                None => "Wait a moment before retrying".to_string(),
            },
            FlowError::ProviderTimeout { .. } | FlowError::HttpError(_) => {
                "Check network connectivity or raise ai.timeout_seconds".to_string()
            }
            FlowError::NoProviderAvailable => {
                "Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or USE_LOCAL_MODELS=true".to_string()
            }
            FlowError::EvaluationNotFound { .. } => {
                "Submit a new evaluation; results are kept in memory only".to_string()
            }
            FlowError::EvaluationInProgress { .. } | FlowError::EvaluationNotCompleted { .. } => {
                "Poll the status endpoint until the evaluation completes".to_string()
            }
            FlowError::UnsupportedFormat { .. } => {
                "Use one of: pdf, html, markdown, json".to_string()
            }
            _ => "Check the logs for details and try again".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Validation => format!("Invalid request: {}", self),
            ErrorCategory::Provider | ErrorCategory::Network => {
                format!("The AI provider could not complete the request: {}", self)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
