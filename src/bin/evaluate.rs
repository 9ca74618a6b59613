use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use flowco::domain::model::BusinessConcept;
use flowco::domain::ports::NoProgress;
use flowco::output::report::{self, report_filename, ReportFormat};
use flowco::config::cli::load_dotenv;
use flowco::utils::logger::{self, LogFormat};
use flowco::{EvaluateArgs, EvaluationEngine, EvaluationOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = EvaluateArgs::parse();

    // 初始化日誌
    logger::init_logger(LogFormat::Compact, args.verbose);
    load_dotenv();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code());
        }
    };

    let format: ReportFormat = args.format.parse()?;

    let raw = tokio::fs::read_to_string(&args.concept)
        .await
        .with_context(|| format!("reading concept file {}", args.concept))?;
    let concept: BusinessConcept =
        serde_json::from_str(&raw).with_context(|| format!("parsing concept file {}", args.concept))?;

    let options = EvaluationOptions {
        include_branding: !args.no_branding,
        include_financial: !args.no_financial,
    };

    let engine = EvaluationEngine::from_config(&config)?;
    tracing::info!("🚀 Evaluating {}", args.concept);

    let result = match engine.evaluate(&concept, options, &NoProgress).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("❌ Evaluation failed: {} (Category: {:?})", e, e.category());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code());
        }
    };

    let body = report::render(format, &concept, &result)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| report_filename("cli", format, Utc::now()));
    tokio::fs::write(&output, &body)
        .await
        .with_context(|| format!("writing report to {}", output))?;

    println!("✅ Overall success score: {:.1}/100", result.overall_success_score);
    println!("📁 Report saved to: {}", output);
    Ok(())
}
