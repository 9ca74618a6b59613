use crate::core::ai_client::{AiClient, GenerationOptions};
use crate::core::parsing::{extract_score, join_or, parse_list_limited};
use crate::domain::model::{BusinessConcept, CompetitiveAnalysis, MarketInsights, ProductAnalysis};
use std::sync::Arc;

const NOT_SPECIFIED: &str = "Not specified";

fn demographics_line(concept: &BusinessConcept) -> String {
    let d = &concept.target_demographics;
    format!("Age {}, {}", d.age_range(), d.income_range.label())
}

fn product_line(concept: &BusinessConcept) -> String {
    concept.product_info.description_or(NOT_SPECIFIED)
}

/// Market research and competition analysis, one prompt per aspect.
pub struct MarketAnalyzer {
    ai: Arc<AiClient>,
}

impl MarketAnalyzer {
    pub fn new(ai: Arc<AiClient>) -> Self {
        Self { ai }
    }

    /// 呼叫失敗只記錄警告，由呼叫端套用預設值
    async fn ask(&self, step: &str, prompt: String, max_tokens: u32) -> Option<String> {
        match self
            .ai
            .generate_text(&prompt, &GenerationOptions::with_max_tokens(max_tokens))
            .await
        {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!("📉 {} failed, using default: {}", step, e);
                None
            }
        }
    }

    pub async fn analyze_market(
        &self,
        concept: &BusinessConcept,
        product_analysis: Option<&ProductAnalysis>,
    ) -> MarketInsights {
        tracing::info!(
            "📈 Analyzing market for concept in {}",
            concept.target_demographics.location
        );

        let demographic_fit_score = self.demographic_fit(concept).await;
        let location_demand_score = self.location_demand(concept).await;
        let market_trends = self.market_trends(concept, product_analysis).await;
        let competition_level = self.competition_level(concept).await;
        let market_size = self.market_size(concept).await;
        let seasonal_factors = self.seasonal_factors(concept).await;
        let regulatory_considerations = self.regulatory_factors(concept).await;
        let target_market_analysis = self
            .target_market_analysis(concept, demographic_fit_score, location_demand_score, &market_trends)
            .await;

        MarketInsights {
            market_size: Some(market_size),
            competition_level,
            market_trends,
            seasonal_factors,
            regulatory_considerations,
            target_market_analysis,
            demographic_fit_score,
            location_demand_score,
        }
    }

    async fn demographic_fit(&self, concept: &BusinessConcept) -> f64 {
        let d = &concept.target_demographics;
        let prompt = format!(
            "Analyze how well this business concept fits the target demographics:\n\n\
             Business Concept: {}\n\
             Product: {}\n\n\
             Target Demographics:\n\
             - Age: {}\n\
             - Income: {}\n\
             - Location: {}\n\
             - Interests: {}\n\
             - Gender: {}\n\
             - Education: {}\n\n\
             Rate the demographic fit on a scale of 0-100, considering:\n\
             1. Age appropriateness of the product/service\n\
             2. Income level alignment with pricing expectations\n\
             3. Interest alignment with the concept\n\
             4. Geographic relevance\n\
             5. Lifestyle compatibility\n\n\
             Provide only a numerical score (0-100).",
            concept.concept_description,
            product_line(concept),
            d.age_range(),
            d.income_range.label(),
            d.location,
            join_or(&d.interests, usize::MAX, NOT_SPECIFIED),
            d.gender.as_deref().unwrap_or(NOT_SPECIFIED),
            d.education_level.as_deref().unwrap_or(NOT_SPECIFIED),
        );
        self.ask("Demographic fit", prompt, 50)
            .await
            .map(|response| extract_score(&response))
            .unwrap_or(50.0)
    }

    async fn location_demand(&self, concept: &BusinessConcept) -> f64 {
        let location = &concept.target_demographics.location;
        let prompt = format!(
            "Analyze the market demand for this business concept in {location}:\n\n\
             Business Concept: {}\n\
             Product/Service: {}\n\
             Target Location: {location}\n\n\
             Consider:\n\
             1. Local market conditions and economy\n\
             2. Population density and demographics\n\
             3. Competition saturation in the area\n\
             4. Local preferences and culture\n\
             5. Infrastructure and accessibility\n\
             6. Regulatory environment\n\n\
             Rate the location demand on a scale of 0-100.\n\
             Provide only a numerical score (0-100).",
            concept.concept_description,
            product_line(concept),
        );
        self.ask("Location demand", prompt, 50)
            .await
            .map(|response| extract_score(&response))
            .unwrap_or(50.0)
    }

    async fn market_trends(
        &self,
        concept: &BusinessConcept,
        product_analysis: Option<&ProductAnalysis>,
    ) -> Vec<String> {
        let category = product_analysis
            .filter(|analysis| analysis.error.is_none())
            .map(|analysis| analysis.product_category.clone())
            .or_else(|| concept.product_info.category.map(|c| c.to_string()))
            .unwrap_or_else(|| "General".to_string());

        let prompt = format!(
            "Identify current market trends relevant to this business concept:\n\n\
             Business Concept: {}\n\
             Product Category: {}\n\
             Target Demographics: {}\n\n\
             List 5-7 current market trends that could impact this business, including:\n\
             - Industry trends\n\
             - Consumer behavior trends\n\
             - Technology trends\n\
             - Economic trends\n\
             - Social trends\n\n\
             Format as a simple list, one trend per line.",
            concept.concept_description,
            category,
            demographics_line(concept),
        );
        self.ask("Market trends", prompt, 300)
            .await
            .map(|response| parse_list_limited(&response, 7))
            .unwrap_or_else(|| vec!["Unable to determine current trends".to_string()])
    }

    async fn competition_level(&self, concept: &BusinessConcept) -> String {
        let prompt = format!(
            "Assess the competition level for this business concept:\n\n\
             Business Concept: {}\n\
             Product/Service: {}\n\
             Target Market: {}\n\n\
             Consider:\n\
             1. Number of existing competitors\n\
             2. Market saturation\n\
             3. Barriers to entry\n\
             4. Brand loyalty in the market\n\
             5. Innovation rate in the industry\n\n\
             Classify competition level as one of: low, medium, high\n\
             Provide only the classification word.",
            concept.concept_description,
            product_line(concept),
            concept.target_demographics.location,
        );
        self.ask("Competition level", prompt, 20)
            .await
            .map(|response| parse_competition_level(&response))
            .unwrap_or_else(|| "medium".to_string())
    }

    async fn market_size(&self, concept: &BusinessConcept) -> String {
        let prompt = format!(
            "Estimate the market size for this business concept:\n\n\
             Business Concept: {}\n\
             Target Location: {}\n\
             Target Demographics: {}\n\n\
             Provide a market size estimate considering:\n\
             1. Total addressable market (TAM)\n\
             2. Serviceable addressable market (SAM)\n\
             3. Local market potential\n\n\
             Format as a brief description (e.g., \"Small local market ($1M-5M)\", \"Large regional market ($50M+)\", etc.)",
            concept.concept_description,
            concept.target_demographics.location,
            demographics_line(concept),
        );
        self.ask("Market size", prompt, 100)
            .await
            .map(|response| response.trim().to_string())
            .filter(|size| !size.is_empty())
            .unwrap_or_else(|| "Market size unknown".to_string())
    }

    async fn seasonal_factors(&self, concept: &BusinessConcept) -> Vec<String> {
        let prompt = format!(
            "Identify seasonal factors that could affect this business:\n\n\
             Business Concept: {}\n\
             Product/Service: {}\n\
             Location: {}\n\n\
             Consider:\n\
             1. Seasonal demand patterns\n\
             2. Weather-related factors\n\
             3. Holiday and event impacts\n\
             4. School calendar effects\n\
             5. Economic cycles\n\n\
             List 3-5 key seasonal factors, one per line.",
            concept.concept_description,
            product_line(concept),
            concept.target_demographics.location,
        );
        self.ask("Seasonal factors", prompt, 200)
            .await
            .map(|response| parse_list_limited(&response, 5))
            .unwrap_or_default()
    }

    async fn regulatory_factors(&self, concept: &BusinessConcept) -> Vec<String> {
        let prompt = format!(
            "Identify regulatory considerations for this business:\n\n\
             Business Concept: {}\n\
             Product/Service: {}\n\
             Location: {}\n\n\
             Consider:\n\
             1. Licensing requirements\n\
             2. Industry regulations\n\
             3. Safety standards\n\
             4. Tax implications\n\
             5. Zoning restrictions\n\
             6. Professional certifications needed\n\n\
             List 3-5 key regulatory considerations, one per line.",
            concept.concept_description,
            product_line(concept),
            concept.target_demographics.location,
        );
        self.ask("Regulatory factors", prompt, 200)
            .await
            .map(|response| parse_list_limited(&response, 5))
            .unwrap_or_default()
    }

    async fn target_market_analysis(
        &self,
        concept: &BusinessConcept,
        demographic_fit: f64,
        location_demand: f64,
        market_trends: &[String],
    ) -> String {
        let prompt = format!(
            "Provide a comprehensive target market analysis for this business concept:\n\n\
             Business Concept: {}\n\
             Target Demographics: {}, {}\n\
             Demographic Fit Score: {:.0}/100\n\
             Location Demand Score: {:.0}/100\n\
             Key Market Trends: {}\n\n\
             Provide a 2-3 paragraph analysis covering:\n\
             1. Target market characteristics and size\n\
             2. Market opportunity and potential\n\
             3. Key challenges and considerations\n\
             4. Recommendations for market entry",
            concept.concept_description,
            demographics_line(concept),
            concept.target_demographics.location,
            demographic_fit,
            location_demand,
            join_or(market_trends, 3, "None identified"),
        );
        self.ask("Target market analysis", prompt, 400)
            .await
            .map(|response| response.trim().to_string())
            .filter(|analysis| !analysis.is_empty())
            .unwrap_or_else(|| "Target market analysis unavailable".to_string())
    }

    pub async fn analyze_competition(
        &self,
        concept: &BusinessConcept,
        insights: &MarketInsights,
    ) -> CompetitiveAnalysis {
        tracing::info!("⚔️ Analyzing competitive landscape");

        let direct_competitors = self.direct_competitors(concept).await;
        let indirect_competitors = self.indirect_competitors(concept).await;
        let competitive_advantages = self.competitive_advantages(concept, &direct_competitors).await;
        let market_gaps = self.market_gaps(concept, &direct_competitors, insights).await;
        let differentiation_opportunities = self
            .differentiation(concept, &direct_competitors, &indirect_competitors)
            .await;

        CompetitiveAnalysis {
            direct_competitors,
            indirect_competitors,
            competitive_advantages,
            market_gaps,
            differentiation_opportunities,
        }
    }

    async fn direct_competitors(&self, concept: &BusinessConcept) -> Vec<String> {
        let prompt = format!(
            "Identify direct competitors for this business concept:\n\n\
             Business Concept: {}\n\
             Product/Service: {}\n\
             Target Market: {}\n\n\
             List 5-7 direct competitors (companies offering similar products/services to similar customers).\n\
             Include both local and national competitors if relevant.\n\
             Format as company names, one per line.",
            concept.concept_description,
            product_line(concept),
            concept.target_demographics.location,
        );
        self.ask("Direct competitors", prompt, 200)
            .await
            .map(|response| parse_list_limited(&response, 7))
            .unwrap_or_default()
    }

    async fn indirect_competitors(&self, concept: &BusinessConcept) -> Vec<String> {
        let prompt = format!(
            "Identify indirect competitors for this business concept:\n\n\
             Business Concept: {}\n\
             Product/Service: {}\n\n\
             List 3-5 indirect competitors (companies solving the same customer problem with different approaches).\n\
             Format as company names or categories, one per line.",
            concept.concept_description,
            product_line(concept),
        );
        self.ask("Indirect competitors", prompt, 150)
            .await
            .map(|response| parse_list_limited(&response, 5))
            .unwrap_or_default()
    }

    async fn competitive_advantages(&self, concept: &BusinessConcept, competitors: &[String]) -> Vec<String> {
        let prompt = format!(
            "Identify competitive advantages for this business concept:\n\n\
             Business Concept: {}\n\
             Product Features: {}\n\
             Listed Advantages: {}\n\
             Key Competitors: {}\n\n\
             List 3-5 potential competitive advantages, considering:\n\
             1. Unique features or capabilities\n\
             2. Cost advantages\n\
             3. Market positioning\n\
             4. Customer experience\n\
             5. Innovation potential\n\n\
             Format as advantages, one per line.",
            concept.concept_description,
            join_or(&concept.product_info.features, usize::MAX, NOT_SPECIFIED),
            join_or(&concept.competitive_advantages, usize::MAX, "None listed"),
            join_or(competitors, 3, "None identified"),
        );
        self.ask("Competitive advantages", prompt, 200)
            .await
            .map(|response| parse_list_limited(&response, 5))
            .unwrap_or_else(|| concept.competitive_advantages.clone())
    }

    async fn market_gaps(
        &self,
        concept: &BusinessConcept,
        competitors: &[String],
        insights: &MarketInsights,
    ) -> Vec<String> {
        let prompt = format!(
            "Identify market gaps and opportunities for this business concept:\n\n\
             Business Concept: {}\n\
             Competition Level: {}\n\
             Key Competitors: {}\n\
             Market Trends: {}\n\n\
             List 3-5 market gaps or underserved segments, considering:\n\
             1. Unmet customer needs\n\
             2. Underserved demographics\n\
             3. Geographic gaps\n\
             4. Service/feature gaps\n\
             5. Price point gaps\n\n\
             Format as opportunities, one per line.",
            concept.concept_description,
            insights.competition_level,
            join_or(competitors, 3, "None identified"),
            join_or(&insights.market_trends, 3, "None identified"),
        );
        self.ask("Market gaps", prompt, 200)
            .await
            .map(|response| parse_list_limited(&response, 5))
            .unwrap_or_default()
    }

    async fn differentiation(
        &self,
        concept: &BusinessConcept,
        direct: &[String],
        indirect: &[String],
    ) -> Vec<String> {
        let prompt = format!(
            "Identify differentiation opportunities for this business concept:\n\n\
             Business Concept: {}\n\
             Direct Competitors: {}\n\
             Indirect Competitors: {}\n\n\
             List 3-5 ways to differentiate from competitors:\n\
             1. Product/service differentiation\n\
             2. Customer experience differentiation\n\
             3. Pricing strategy differentiation\n\
             4. Brand positioning differentiation\n\
             5. Distribution channel differentiation\n\n\
             Format as differentiation strategies, one per line.",
            concept.concept_description,
            join_or(direct, 3, "None"),
            join_or(indirect, 3, "None"),
        );
        self.ask("Differentiation opportunities", prompt, 200)
            .await
            .map(|response| parse_list_limited(&response, 5))
            .unwrap_or_default()
    }
}

/// Accepts `low`, `medium` or `high` (case and trailing punctuation ignored); anything else is `medium`.
pub fn parse_competition_level(response: &str) -> String {
    let level = response
        .trim()
        .trim_matches(|c: char| !c.is_alphabetic())
        .to_lowercase();
    match level.as_str() {
        "low" | "medium" | "high" => level,
        _ => "medium".to_string(),
    }
}
