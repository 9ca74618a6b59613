use crate::config::toml_config::AppConfig;
use crate::core::ai_client::{AiClient, GenerationOptions};
use crate::core::branding::BrandingGenerator;
use crate::core::input::InputProcessor;
use crate::core::market::MarketAnalyzer;
use crate::core::parsing::{join_or, parse_labeled_sections, parse_score_block};
use crate::core::vision::VisionAnalyzer;
use crate::domain::model::{
    BrandingRecommendations, BusinessConcept, CompetitiveAnalysis, EvaluationOptions, EvaluationResult,
    FinancialProjections, MarketInsights, ProductAnalysis, RiskAssessment,
};
use crate::domain::ports::ProgressSink;
use crate::utils::error::{FlowError, Result};
use crate::utils::monitor::EvaluationMonitor;
use crate::utils::validation::Validate;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

const SCORE_KEYS: [&str; 5] = [
    "market_demand_score",
    "concept_viability_score",
    "execution_difficulty_score",
    "overall_success_score",
    "confidence_level",
];

/// 四個核心分數加上信心值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreScores {
    pub market_demand: f64,
    pub concept_viability: f64,
    pub execution_difficulty: f64,
    pub overall_success: f64,
    pub confidence: f64,
}

impl CoreScores {
    /// Used when the scoring prompt cannot be answered.
    pub fn unavailable() -> Self {
        Self {
            market_demand: 50.0,
            concept_viability: 50.0,
            execution_difficulty: 50.0,
            overall_success: 50.0,
            confidence: 25.0,
        }
    }

    pub fn from_response(response: &str) -> Self {
        let scores = parse_score_block(response, &SCORE_KEYS);
        let get = |key: &str| scores.get(key).copied().unwrap_or(50.0);
        Self {
            market_demand: get("market_demand_score"),
            concept_viability: get("concept_viability_score"),
            execution_difficulty: get("execution_difficulty_score"),
            overall_success: get("overall_success_score"),
            confidence: get("confidence_level"),
        }
    }
}

pub fn baseline_financials() -> FinancialProjections {
    FinancialProjections {
        startup_costs: Some("$10,000 - $50,000".to_string()),
        revenue_projections: BTreeMap::from([
            ("Year 1".to_string(), "$50,000 - $100,000".to_string()),
            ("Year 2".to_string(), "$100,000 - $250,000".to_string()),
            ("Year 3".to_string(), "$200,000 - $500,000".to_string()),
        ]),
        break_even_timeline: Some("12-18 months".to_string()),
        funding_recommendations: vec![
            "Bootstrap".to_string(),
            "Angel investment".to_string(),
            "Small business loan".to_string(),
        ],
        cost_structure: vec![
            "Product development".to_string(),
            "Marketing".to_string(),
            "Operations".to_string(),
            "Personnel".to_string(),
        ],
    }
}

pub fn baseline_risks() -> RiskAssessment {
    RiskAssessment {
        high_risks: vec!["Market competition".to_string(), "Customer acquisition".to_string()],
        medium_risks: vec!["Regulatory changes".to_string(), "Economic downturn".to_string()],
        low_risks: vec!["Technology obsolescence".to_string()],
        mitigation_strategies: BTreeMap::from([
            (
                "Market competition".to_string(),
                "Focus on unique value proposition".to_string(),
            ),
            (
                "Customer acquisition".to_string(),
                "Develop strong marketing strategy".to_string(),
            ),
        ]),
        success_factors: vec![
            "Product-market fit".to_string(),
            "Strong execution".to_string(),
            "Adequate funding".to_string(),
        ],
    }
}

fn default_recommendations() -> Vec<String> {
    [
        "Conduct detailed market research",
        "Develop minimum viable product",
        "Test with target audience",
        "Secure initial funding",
        "Build strong team",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_next_steps() -> Vec<String> {
    [
        "Validate product-market fit",
        "Create business plan",
        "Develop prototype",
        "Identify key partnerships",
        "Plan go-to-market strategy",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Reads a `STARTUP COSTS:` / `YEAR n REVENUE:` / ... block.
///
/// Fields the answer leaves out are taken from [`baseline_financials`].
pub fn parse_financials(response: &str) -> FinancialProjections {
    let sections = parse_labeled_sections(response);
    let text = |label: &str| {
        sections
            .get(label)
            .map(|s| s.text.clone())
            .filter(|t| !t.is_empty())
    };
    let list = |label: &str| {
        sections
            .get(label)
            .map(|s| s.as_list())
            .unwrap_or_default()
    };

    let mut revenue_projections = BTreeMap::new();
    for year in 1..=3 {
        if let Some(value) = text(&format!("YEAR {} REVENUE", year)) {
            revenue_projections.insert(format!("Year {}", year), value);
        }
    }

    let parsed = FinancialProjections {
        startup_costs: text("STARTUP COSTS"),
        revenue_projections,
        break_even_timeline: text("BREAK-EVEN").or_else(|| text("BREAK EVEN")),
        funding_recommendations: list("FUNDING"),
        cost_structure: list("COST STRUCTURE"),
    };

    let baseline = baseline_financials();
    FinancialProjections {
        startup_costs: parsed.startup_costs.or(baseline.startup_costs),
        revenue_projections: if parsed.revenue_projections.is_empty() {
            baseline.revenue_projections
        } else {
            parsed.revenue_projections
        },
        break_even_timeline: parsed.break_even_timeline.or(baseline.break_even_timeline),
        funding_recommendations: non_empty_or(parsed.funding_recommendations, baseline.funding_recommendations),
        cost_structure: non_empty_or(parsed.cost_structure, baseline.cost_structure),
    }
}

/// Reads `HIGH RISKS:` / `MEDIUM RISKS:` / `LOW RISKS:` / `MITIGATION:` /
/// `SUCCESS FACTORS:`; an answer with none of them yields [`baseline_risks`].
pub fn parse_risks(response: &str) -> RiskAssessment {
    let sections = parse_labeled_sections(response);
    let list = |label: &str| {
        sections
            .get(label)
            .map(|s| s.as_list())
            .unwrap_or_default()
    };

    let mitigation_strategies = sections
        .get("MITIGATION")
        .map(|s| s.items.clone())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let (risk, strategy) = item.split_once(':')?;
            let (risk, strategy) = (risk.trim(), strategy.trim());
            (!risk.is_empty() && !strategy.is_empty()).then(|| (risk.to_string(), strategy.to_string()))
        })
        .collect();

    let parsed = RiskAssessment {
        high_risks: list("HIGH RISKS"),
        medium_risks: list("MEDIUM RISKS"),
        low_risks: list("LOW RISKS"),
        mitigation_strategies,
        success_factors: list("SUCCESS FACTORS"),
    };

    if parsed.is_empty() {
        tracing::debug!("Risk answer had no recognizable sections, using baseline");
        baseline_risks()
    } else {
        parsed
    }
}

/// Executive summary, recommendations and next steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryParts {
    pub executive_summary: String,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
}

impl SummaryParts {
    pub fn unavailable() -> Self {
        Self {
            executive_summary: "Summary not available".to_string(),
            recommendations: default_recommendations(),
            next_steps: default_next_steps(),
        }
    }
}

pub fn parse_summary(response: &str) -> SummaryParts {
    let sections = parse_labeled_sections(response);
    let list = |label: &str| {
        let mut items = sections
            .get(label)
            .map(|s| s.as_list())
            .unwrap_or_default();
        items.truncate(7);
        items
    };

    // 沒有標籤時取第一段
    let executive_summary = sections
        .get("EXECUTIVE SUMMARY")
        .map(|s| s.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            response
                .trim()
                .split("\n\n")
                .next()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
        })
        .unwrap_or_else(|| "Summary not available".to_string());

    SummaryParts {
        executive_summary,
        recommendations: non_empty_or(list("RECOMMENDATIONS"), default_recommendations()),
        next_steps: non_empty_or(list("NEXT STEPS"), default_next_steps()),
    }
}

fn non_empty_or(items: Vec<String>, fallback: Vec<String>) -> Vec<String> {
    if items.is_empty() {
        fallback
    } else {
        items
    }
}

/// Runs the full evaluation pipeline for one business concept.
pub struct EvaluationEngine {
    ai: Arc<AiClient>,
    input: InputProcessor,
    vision: VisionAnalyzer,
    market: MarketAnalyzer,
    branding: BrandingGenerator,
    model_version: String,
    monitor_enabled: bool,
}

impl EvaluationEngine {
    pub fn new(ai: Arc<AiClient>, input: InputProcessor, model_version: impl Into<String>) -> Self {
        Self {
            vision: VisionAnalyzer::new(ai.clone()),
            market: MarketAnalyzer::new(ai.clone()),
            branding: BrandingGenerator::new(ai.clone()),
            ai,
            input,
            model_version: model_version.into(),
            monitor_enabled: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let ai = Arc::new(AiClient::from_config(config)?);
        Ok(Self::new(ai, InputProcessor::new(&config.processing), &config.output.model_version)
            .with_monitoring(config.server.monitor))
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor_enabled = enabled;
        self
    }

    pub fn ai(&self) -> &Arc<AiClient> {
        &self.ai
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub async fn evaluate(
        &self,
        concept: &BusinessConcept,
        options: EvaluationOptions,
        progress: &dyn ProgressSink,
    ) -> Result<EvaluationResult> {
        concept.validate()?;
        if !self.ai.is_available() {
            return Err(FlowError::NoProviderAvailable);
        }

        let preview: String = concept.concept_description.chars().take(100).collect();
        tracing::info!("🚀 Starting evaluation: {}", preview);
        let monitor = EvaluationMonitor::new(self.monitor_enabled);

        // 1. 輸入清理
        let concept = self.input.process(concept);
        monitor.record_phase("input");
        progress.report(10, "input").await;

        // 2. 產品圖片
        let product_analysis = if concept.product_info.has_image() {
            let analysis = self.vision.analyze_product_image(&concept.product_info).await;
            monitor.record_phase("vision");
            Some(analysis)
        } else {
            None
        };
        progress.report(20, "vision").await;

        // 3. 市場研究
        let market_insights = self
            .market
            .analyze_market(&concept, product_analysis.as_ref())
            .await;
        monitor.record_phase("market");
        progress.report(35, "market").await;

        // 4. 核心分數
        let scores = self
            .core_scores(&concept, &market_insights, product_analysis.as_ref())
            .await;
        monitor.record_phase("scoring");
        progress.report(50, "scoring").await;

        // 5. 品牌建議 (可選)
        let branding_recommendations = if options.include_branding {
            let branding = self
                .branding
                .generate_branding(&concept, &market_insights, product_analysis.as_ref())
                .await;
            monitor.record_phase("branding");
            branding
        } else {
            BrandingRecommendations::placeholder("Not generated")
        };
        progress.report(60, "branding").await;

        // 6. 競爭分析
        let competitive_analysis = self.market.analyze_competition(&concept, &market_insights).await;
        monitor.record_phase("competition");
        progress.report(70, "competition").await;

        // 7. 財務預估 (可選)
        let financial_projections = if options.include_financial {
            let financials = self.financial_projections(&concept, &market_insights, &scores).await;
            monitor.record_phase("financial");
            financials
        } else {
            FinancialProjections::default()
        };
        progress.report(80, "financial").await;

        // 8. 風險評估
        let risk_assessment = self.assess_risks(&concept, &market_insights, &scores).await;
        monitor.record_phase("risk");
        progress.report(90, "risk").await;

        // 9. 摘要與建議
        let summary = self
            .summary(&concept, &scores, &market_insights, &competitive_analysis)
            .await;
        monitor.record_phase("summary");
        progress.report(95, "summary").await;

        let result = EvaluationResult {
            overall_success_score: scores.overall_success,
            market_demand_score: scores.market_demand,
            concept_viability_score: scores.concept_viability,
            execution_difficulty_score: scores.execution_difficulty,
            market_insights,
            branding_recommendations,
            competitive_analysis,
            financial_projections,
            risk_assessment,
            product_analysis,
            executive_summary: summary.executive_summary,
            key_recommendations: summary.recommendations,
            next_steps: summary.next_steps,
            evaluation_date: Utc::now(),
            model_version: self.model_version.clone(),
            confidence_level: scores.confidence,
        };

        monitor.log_final_stats();
        tracing::info!(
            "✅ Evaluation completed. Overall success score: {:.1}",
            result.overall_success_score
        );
        Ok(result)
    }

    async fn core_scores(
        &self,
        concept: &BusinessConcept,
        insights: &MarketInsights,
        product_analysis: Option<&ProductAnalysis>,
    ) -> CoreScores {
        let d = &concept.target_demographics;
        let product_notes = match product_analysis {
            Some(analysis) if analysis.error.is_none() => format!(
                "{} (visual appeal {}/10, design quality: {})",
                analysis.product_category, analysis.visual_appeal_score, analysis.design_quality
            ),
            _ => "Not available".to_string(),
        };

        let prompt = format!(
            "Analyze the following business concept and provide numerical scores (0-100) for each category:\n\n\
             Business Concept: {}\n\
             Target Demographics: age {}, income {}, location {}, interests {}\n\
             Market Context: competition {}, demographic fit {:.0}, location demand {:.0}, trends {}\n\
             Product Information: {}; features {}; image analysis {}\n\n\
             Please provide scores for:\n\
             1. Market Demand Score (0-100): How much demand exists for this product/service\n\
             2. Concept Viability Score (0-100): How viable and realistic the concept is\n\
             3. Execution Difficulty Score (0-100): How difficult it would be to execute (higher = more difficult)\n\
             4. Overall Success Score (0-100): Overall probability of business success\n\n\
             Consider factors like:\n\
             - Market size and growth potential\n\
             - Competition level and market saturation\n\
             - Target demographic alignment\n\
             - Product-market fit\n\
             - Execution complexity and resource requirements\n\
             - Geographic market conditions\n\
             - Current trends and timing\n\n\
             Respond with only the numerical scores in this format:\n\
             Market Demand Score: XX\n\
             Concept Viability Score: XX\n\
             Execution Difficulty Score: XX\n\
             Overall Success Score: XX\n\
             Confidence Level: XX",
            concept.concept_description,
            d.age_range(),
            d.income_range.label(),
            d.location,
            join_or(&d.interests, usize::MAX, "none"),
            insights.competition_level,
            insights.demographic_fit_score,
            insights.location_demand_score,
            join_or(&insights.market_trends, usize::MAX, "none"),
            concept.product_info.description_or("Not specified"),
            join_or(&concept.product_info.features, usize::MAX, "none"),
            product_notes,
        );

        match self.ai.generate_text(&prompt, &GenerationOptions::default()).await {
            Ok(response) => CoreScores::from_response(&response),
            Err(e) => {
                tracing::error!("❌ Error calculating scores: {}", e);
                CoreScores::unavailable()
            }
        }
    }

    async fn financial_projections(
        &self,
        concept: &BusinessConcept,
        insights: &MarketInsights,
        scores: &CoreScores,
    ) -> FinancialProjections {
        let prompt = format!(
            "Estimate financial projections for this business concept:\n\n\
             Business Concept: {}\n\
             Business Model: {}\n\
             Funding Requirements: {}\n\
             Market Size: {}\n\
             Competition Level: {}\n\
             Overall Success Score: {:.1}/100\n\n\
             Respond in this format:\n\
             STARTUP COSTS: [range]\n\
             YEAR 1 REVENUE: [range]\n\
             YEAR 2 REVENUE: [range]\n\
             YEAR 3 REVENUE: [range]\n\
             BREAK-EVEN: [timeline]\n\
             FUNDING:\n\
             - [funding option]\n\
             COST STRUCTURE:\n\
             - [major cost]",
            concept.concept_description,
            concept.business_model.as_deref().unwrap_or("Not specified"),
            concept.funding_requirements.as_deref().unwrap_or("Not specified"),
            insights.market_size.as_deref().unwrap_or("Unknown"),
            insights.competition_level,
            scores.overall_success,
        );

        match self
            .ai
            .generate_text(&prompt, &GenerationOptions::with_max_tokens(500))
            .await
        {
            Ok(response) => parse_financials(&response),
            Err(e) => {
                tracing::warn!("💰 Financial projections failed, using baseline: {}", e);
                baseline_financials()
            }
        }
    }

    async fn assess_risks(
        &self,
        concept: &BusinessConcept,
        insights: &MarketInsights,
        scores: &CoreScores,
    ) -> RiskAssessment {
        let prompt = format!(
            "Analyze the risks for this business concept:\n\n\
             Concept: {}\n\
             Market Competition: {}\n\
             Target Market: {}\n\
             Execution Difficulty Score: {:.1}/100\n\n\
             Identify and categorize risks as high, medium, or low priority.\n\
             Also suggest mitigation strategies and critical success factors.\n\n\
             Respond in this format:\n\
             HIGH RISKS:\n\
             - [risk]\n\
             MEDIUM RISKS:\n\
             - [risk]\n\
             LOW RISKS:\n\
             - [risk]\n\
             MITIGATION:\n\
             - [risk]: [strategy]\n\
             SUCCESS FACTORS:\n\
             - [factor]",
            concept.concept_description,
            insights.competition_level,
            concept.target_demographics.location,
            scores.execution_difficulty,
        );

        match self
            .ai
            .generate_text(&prompt, &GenerationOptions::with_max_tokens(500))
            .await
        {
            Ok(response) => parse_risks(&response),
            Err(e) => {
                tracing::warn!("⚠️ Risk assessment failed, using baseline: {}", e);
                baseline_risks()
            }
        }
    }

    async fn summary(
        &self,
        concept: &BusinessConcept,
        scores: &CoreScores,
        insights: &MarketInsights,
        competition: &CompetitiveAnalysis,
    ) -> SummaryParts {
        let d = &concept.target_demographics;
        let prompt = format!(
            "Create an executive summary and recommendations for this business evaluation:\n\n\
             Business Concept: {}\n\
             Overall Success Score: {:.1}/100\n\
             Market Demand Score: {:.1}/100\n\
             Competition Level: {}\n\
             Key Competitors: {}\n\
             Target Demographics: Age {}, {}, {}\n\n\
             Provide:\n\
             1. A concise executive summary (2-3 paragraphs)\n\
             2. 5-7 key recommendations\n\
             3. 5-7 immediate next steps\n\n\
             Respond in this format:\n\
             EXECUTIVE SUMMARY: [summary]\n\
             RECOMMENDATIONS:\n\
             - [recommendation]\n\
             NEXT STEPS:\n\
             - [step]",
            concept.concept_description,
            scores.overall_success,
            scores.market_demand,
            insights.competition_level,
            join_or(&competition.direct_competitors, 3, "None identified"),
            d.age_range(),
            d.income_range.label(),
            d.location,
        );

        match self.ai.generate_text(&prompt, &GenerationOptions::default()).await {
            Ok(response) => parse_summary(&response),
            Err(e) => {
                tracing::error!("❌ Error generating summary: {}", e);
                SummaryParts::unavailable()
            }
        }
    }
}
