use crate::config::toml_config::AppConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use std::path::Path;

/// 預設配置檔；不存在時使用內建預設值
pub const DEFAULT_CONFIG_PATH: &str = "flowco.toml";

#[derive(Debug, Clone, Parser)]
#[command(name = "flowco")]
#[command(about = "Business concept evaluation service")]
pub struct ServeArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Override bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Override bind port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,
}

impl ServeArgs {
    /// 載入配置並套用環境變數與命令列覆蓋
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = load_config_file(&self.config)?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(monitor) = self.monitor {
            config.server.monitor = monitor;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "flowco-evaluate")]
#[command(about = "Evaluate a business concept once and write a report")]
pub struct EvaluateArgs {
    /// JSON file containing the business concept
    pub concept: String,

    /// Report format: pdf, html, markdown or json
    #[arg(short, long, default_value = "markdown")]
    pub format: String,

    /// Output file; defaults to a generated name in the current directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Skip branding recommendations
    #[arg(long)]
    pub no_branding: bool,

    /// Skip financial projections
    #[arg(long)]
    pub no_financial: bool,

    /// Print timing for each evaluation phase
    #[arg(long)]
    pub monitor: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl EvaluateArgs {
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = load_config_file(&self.config)?;
        if self.monitor {
            config.server.monitor = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// 載入目前目錄 (或上層目錄) 的 .env；已存在的環境變數不會被覆蓋
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::info!("🔑 Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("⚠️ Could not read .env file: {}", e),
    }
}

/// Reads the file when present, otherwise starts from defaults; env overrides apply either way.
pub fn load_config_file(path: &str) -> Result<AppConfig> {
    let mut config = if Path::new(path).exists() {
        tracing::info!("📁 Loading configuration from: {}", path);
        AppConfig::from_file(path)?
    } else {
        tracing::info!("📁 {} not found, using built-in defaults", path);
        AppConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
