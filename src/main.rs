use clap::Parser;
use flowco::config::cli::load_dotenv;
use flowco::utils::logger::{self, LogFormat};
use flowco::{AppState, ServeArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServeArgs::parse();

    // 初始化日誌
    logger::init_logger(LogFormat::from_json_flag(args.json_logs), args.verbose);

    tracing::info!("🚀 Starting FlowCo evaluation service v{}", env!("CARGO_PKG_VERSION"));

    // 載入 .env 後再讀取配置
    load_dotenv();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.severity().exit_code());
        }
    };
    if args.verbose {
        tracing::debug!("Configuration: {:?}", config.server);
    }

    if !config.has_ai_provider() {
        tracing::warn!("⚠️ No AI provider configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY or USE_LOCAL_MODELS=true");
        tracing::warn!("⚠️ Evaluations will be accepted but fail until a provider is available");
    } else {
        tracing::info!("🤖 Available models: {}", config.available_models().join(", "));
    }
    if config.server.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let state = AppState::from_config(&config)?;

    if let Err(e) = flowco::serve(state, &config.server.host, config.server.port).await {
        tracing::error!(
            "❌ Server stopped: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.severity().exit_code());
    }

    Ok(())
}
