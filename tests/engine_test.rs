use async_trait::async_trait;
use flowco::adapters::providers::{MockProvider, MockReply};
use flowco::config::toml_config::ProcessingConfig;
use flowco::core::{AiClient, ClientSettings, InputProcessor, LlmProvider, ProgressSink};
use flowco::domain::model::{BusinessConcept, Demographics, EvaluationOptions, IncomeRange, ProductInfo};
use flowco::{EvaluationEngine, FlowError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingProgress {
    updates: Mutex<Vec<(u8, String)>>,
}

impl RecordingProgress {
    fn percentages(&self) -> Vec<u8> {
        self.updates.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn report(&self, progress: u8, phase: &str) {
        self.updates.lock().unwrap().push((progress, phase.to_string()));
    }
}

fn engine_with(provider: Arc<MockProvider>) -> EvaluationEngine {
    let settings = ClientSettings {
        default_model: "mock-model".to_string(),
        vision_model: "mock-model".to_string(),
        retry_attempts: 1,
        retry_delay: Duration::from_millis(1),
    };
    let providers: Vec<Arc<dyn LlmProvider>> = vec![provider as Arc<dyn LlmProvider>];
    let ai = Arc::new(AiClient::new(providers, settings));
    EvaluationEngine::new(ai, InputProcessor::new(&ProcessingConfig::default()), "test-1")
}

fn concept() -> BusinessConcept {
    BusinessConcept {
        concept_description: "Mobile bike repair   service that comes to your office".to_string(),
        target_demographics: Demographics {
            age_min: 25,
            age_max: 55,
            income_range: IncomeRange::UpperMiddle,
            location: "seattle, wa".to_string(),
            interests: vec!["cycling".to_string(), "commuting".to_string()],
            gender: None,
            education_level: None,
            lifestyle: Some("active".to_string()),
        },
        product_info: ProductInfo {
            name: Some("SpokeFix".to_string()),
            description: Some("On-site tune-ups while you work".to_string()),
            features: vec!["Same-day service".to_string()],
            ..ProductInfo::default()
        },
        business_model: Some("Subscription".to_string()),
        competitive_advantages: vec!["No drop-off needed".to_string()],
        funding_requirements: None,
        timeline: None,
    }
}

#[tokio::test]
async fn test_full_evaluation_reports_progress_in_order() {
    let provider = Arc::new(
        MockProvider::new()
            .with_rule(
                "provide numerical scores",
                MockReply::text(
                    "Market Demand Score: 81\nConcept Viability Score: 74\nExecution Difficulty Score: 35\nOverall Success Score: 77\nConfidence Level: 70",
                ),
            )
            .with_rule(
                "Estimate financial projections",
                MockReply::text("STARTUP COSTS: $8,000 - $15,000\nYEAR 1 REVENUE: $60,000\nBREAK-EVEN: 9 months"),
            )
            .with_rule(
                "executive summary",
                MockReply::text(
                    "EXECUTIVE SUMMARY: Strong urban demand.\nRECOMMENDATIONS:\n- Partner with offices\nNEXT STEPS:\n- Buy a van",
                ),
            ),
    );
    let engine = engine_with(provider.clone());
    let progress = RecordingProgress::default();

    let result = engine
        .evaluate(&concept(), EvaluationOptions::default(), &progress)
        .await
        .unwrap();

    assert_eq!(progress.percentages(), vec![10, 20, 35, 50, 60, 70, 80, 90, 95]);
    assert_eq!(result.overall_success_score, 77.0);
    assert_eq!(result.execution_difficulty_score, 35.0);
    assert_eq!(result.confidence_level, 70.0);
    assert_eq!(result.model_version, "test-1");
    assert!(result.product_analysis.is_none());

    let financials = &result.financial_projections;
    assert_eq!(financials.startup_costs.as_deref(), Some("$8,000 - $15,000"));
    assert_eq!(financials.break_even_timeline.as_deref(), Some("9 months"));
    assert_eq!(financials.revenue_projections.len(), 1);
    // 缺少的欄位由基準值補上
    assert!(!financials.funding_recommendations.is_empty());

    assert_eq!(result.executive_summary, "Strong urban demand.");
    assert_eq!(result.key_recommendations, vec!["Partner with offices"]);
    assert_eq!(result.next_steps, vec!["Buy a van"]);

    // 輸入經過清理後才送進 prompt
    assert!(provider
        .prompts()
        .iter()
        .any(|p| p.contains("Mobile bike repair service that comes to your office")));
}

#[tokio::test]
async fn test_optional_sections_are_skipped() {
    let provider = Arc::new(MockProvider::new());
    let engine = engine_with(provider.clone());
    let options = EvaluationOptions {
        include_branding: false,
        include_financial: false,
    };

    let result = engine
        .evaluate(&concept(), options, &RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(result.branding_recommendations.brand_positioning, "Not generated");
    assert!(result.branding_recommendations.color_palette.is_empty());
    assert!(result.financial_projections.is_empty());

    let prompts = provider.prompts();
    assert!(!prompts.iter().any(|p| p.contains("Estimate financial projections")));
    assert!(!prompts.iter().any(|p| p.contains("brand positioning statement")));
}

#[tokio::test]
async fn test_failing_provider_still_produces_result() {
    let provider = Arc::new(MockProvider::new().with_fallback(MockReply::Status(500)));
    let engine = engine_with(provider.clone());

    let result = engine
        .evaluate(&concept(), EvaluationOptions::default(), &RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(result.overall_success_score, 50.0);
    assert_eq!(result.confidence_level, 25.0);
    assert_eq!(result.market_insights.competition_level, "medium");
    assert_eq!(result.executive_summary, "Summary not available");
    assert_eq!(
        result.financial_projections.startup_costs.as_deref(),
        Some("$10,000 - $50,000")
    );
    assert!(!result.risk_assessment.is_empty());
    assert!(provider.call_count() > 10);
}

#[tokio::test]
async fn test_invalid_concept_is_rejected_before_any_prompt() {
    let provider = Arc::new(MockProvider::new());
    let engine = engine_with(provider.clone());

    let mut invalid = concept();
    invalid.product_info.description = None;

    let err = engine
        .evaluate(&invalid, EvaluationOptions::default(), &RecordingProgress::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::ValidationError { .. }));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_engine_without_provider_fails_fast() {
    let ai = Arc::new(AiClient::new(Vec::new(), ClientSettings::default()));
    let engine = EvaluationEngine::new(ai, InputProcessor::new(&ProcessingConfig::default()), "test-1");
    let progress = RecordingProgress::default();

    let err = engine
        .evaluate(&concept(), EvaluationOptions::default(), &progress)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::NoProviderAvailable));
    assert!(progress.percentages().is_empty());
}
