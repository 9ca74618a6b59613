use crate::utils::error::{FlowError, Result};
use crate::utils::validation::{require_description_or_image, require_text, validate_age_span, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeRange {
    Low,
    LowerMiddle,
    Middle,
    UpperMiddle,
    High,
}

impl IncomeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeRange::Low => "low",
            IncomeRange::LowerMiddle => "lower_middle",
            IncomeRange::Middle => "middle",
            IncomeRange::UpperMiddle => "upper_middle",
            IncomeRange::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IncomeRange::Low => "<$30k",
            IncomeRange::LowerMiddle => "$30k-$50k",
            IncomeRange::Middle => "$50k-$80k",
            IncomeRange::UpperMiddle => "$80k-$120k",
            IncomeRange::High => ">$120k",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Ok(IncomeRange::Low),
            "lower_middle" => Ok(IncomeRange::LowerMiddle),
            "middle" => Ok(IncomeRange::Middle),
            "upper_middle" => Ok(IncomeRange::UpperMiddle),
            "high" => Ok(IncomeRange::High),
            other => Err(FlowError::validation(
                "income_range",
                format!("Unknown income range '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for IncomeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCategory {
    Technology,
    Retail,
    FoodBeverage,
    HealthFitness,
    Education,
    Entertainment,
    Finance,
    RealEstate,
    Automotive,
    Fashion,
    HomeGarden,
    Travel,
    ProfessionalServices,
    Other,
}

impl BusinessCategory {
    pub const ALL: [BusinessCategory; 14] = [
        BusinessCategory::Technology,
        BusinessCategory::Retail,
        BusinessCategory::FoodBeverage,
        BusinessCategory::HealthFitness,
        BusinessCategory::Education,
        BusinessCategory::Entertainment,
        BusinessCategory::Finance,
        BusinessCategory::RealEstate,
        BusinessCategory::Automotive,
        BusinessCategory::Fashion,
        BusinessCategory::HomeGarden,
        BusinessCategory::Travel,
        BusinessCategory::ProfessionalServices,
        BusinessCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessCategory::Technology => "technology",
            BusinessCategory::Retail => "retail",
            BusinessCategory::FoodBeverage => "food_beverage",
            BusinessCategory::HealthFitness => "health_fitness",
            BusinessCategory::Education => "education",
            BusinessCategory::Entertainment => "entertainment",
            BusinessCategory::Finance => "finance",
            BusinessCategory::RealEstate => "real_estate",
            BusinessCategory::Automotive => "automotive",
            BusinessCategory::Fashion => "fashion",
            BusinessCategory::HomeGarden => "home_garden",
            BusinessCategory::Travel => "travel",
            BusinessCategory::ProfessionalServices => "professional_services",
            BusinessCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let wanted = value.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| {
                FlowError::validation("category", format!("Unknown category '{}'", value))
            })
    }
}

impl std::fmt::Display for BusinessCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographics {
    pub age_min: u32,
    pub age_max: u32,
    pub income_range: IncomeRange,
    pub location: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub lifestyle: Option<String>,
}

impl Demographics {
    pub fn age_range(&self) -> String {
        format!("{}-{}", self.age_min, self.age_max)
    }
}

impl Validate for Demographics {
    fn validate(&self) -> Result<()> {
        validate_age_span(self.age_min, self.age_max)?;
        require_text("target_demographics.location", &self.location)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Raw image bytes, carried as base64 in JSON payloads.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub image_data: Option<Vec<u8>>,
    #[serde(default)]
    pub category: Option<BusinessCategory>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ProductInfo {
    pub fn has_image(&self) -> bool {
        self.image_data.as_ref().is_some_and(|data| !data.is_empty())
    }

    pub fn description_or(&self, fallback: &str) -> String {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Your Business")
            .to_string()
    }
}

impl Validate for ProductInfo {
    fn validate(&self) -> Result<()> {
        require_description_or_image(self.description.as_deref(), self.has_image())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConcept {
    pub concept_description: String,
    pub target_demographics: Demographics,
    pub product_info: ProductInfo,
    #[serde(default)]
    pub business_model: Option<String>,
    #[serde(default)]
    pub competitive_advantages: Vec<String>,
    #[serde(default)]
    pub funding_requirements: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
}

impl Validate for BusinessConcept {
    fn validate(&self) -> Result<()> {
        require_text("concept_description", &self.concept_description)?;
        self.target_demographics.validate()?;
        self.product_info.validate()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationOptions {
    #[serde(default = "default_true")]
    pub include_branding: bool,
    #[serde(default = "default_true")]
    pub include_financial: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            include_branding: true,
            include_financial: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInsights {
    pub market_size: Option<String>,
    pub competition_level: String,
    #[serde(default)]
    pub market_trends: Vec<String>,
    #[serde(default)]
    pub seasonal_factors: Vec<String>,
    #[serde(default)]
    pub regulatory_considerations: Vec<String>,
    pub target_market_analysis: String,
    pub demographic_fit_score: f64,
    pub location_demand_score: f64,
}

impl Default for MarketInsights {
    fn default() -> Self {
        Self {
            market_size: Some("Unknown".to_string()),
            competition_level: "medium".to_string(),
            market_trends: vec!["Unable to determine trends".to_string()],
            seasonal_factors: Vec::new(),
            regulatory_considerations: Vec::new(),
            target_market_analysis: "Market analysis unavailable".to_string(),
            demographic_fit_score: 50.0,
            location_demand_score: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandingRecommendations {
    pub brand_positioning: String,
    #[serde(default)]
    pub key_messaging: Vec<String>,
    #[serde(default)]
    pub visual_identity_suggestions: Vec<String>,
    #[serde(default)]
    pub marketing_channels: Vec<String>,
    pub content_strategy: String,
    #[serde(default)]
    pub logo_concepts: Vec<String>,
    #[serde(default)]
    pub color_palette: Vec<String>,
    #[serde(default)]
    pub commercial_script: Option<String>,
}

impl BrandingRecommendations {
    pub fn placeholder(text: &str) -> Self {
        Self {
            brand_positioning: text.to_string(),
            key_messaging: Vec::new(),
            visual_identity_suggestions: Vec::new(),
            marketing_channels: Vec::new(),
            content_strategy: text.to_string(),
            logo_concepts: Vec::new(),
            color_palette: Vec::new(),
            commercial_script: None,
        }
    }

    pub fn tagline(&self) -> String {
        self.key_messaging
            .first()
            .cloned()
            .unwrap_or_else(|| "Your Success Partner".to_string())
    }

    pub fn color_or(&self, index: usize, fallback: &str) -> String {
        self.color_palette
            .get(index)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetitiveAnalysis {
    #[serde(default)]
    pub direct_competitors: Vec<String>,
    #[serde(default)]
    pub indirect_competitors: Vec<String>,
    #[serde(default)]
    pub competitive_advantages: Vec<String>,
    #[serde(default)]
    pub market_gaps: Vec<String>,
    #[serde(default)]
    pub differentiation_opportunities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialProjections {
    #[serde(default)]
    pub startup_costs: Option<String>,
    #[serde(default)]
    pub revenue_projections: BTreeMap<String, String>,
    #[serde(default)]
    pub break_even_timeline: Option<String>,
    #[serde(default)]
    pub funding_recommendations: Vec<String>,
    #[serde(default)]
    pub cost_structure: Vec<String>,
}

impl FinancialProjections {
    pub fn is_empty(&self) -> bool {
        self.startup_costs.is_none()
            && self.revenue_projections.is_empty()
            && self.break_even_timeline.is_none()
            && self.funding_recommendations.is_empty()
            && self.cost_structure.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default)]
    pub high_risks: Vec<String>,
    #[serde(default)]
    pub medium_risks: Vec<String>,
    #[serde(default)]
    pub low_risks: Vec<String>,
    #[serde(default)]
    pub mitigation_strategies: BTreeMap<String, String>,
    #[serde(default)]
    pub success_factors: Vec<String>,
}

impl RiskAssessment {
    pub fn is_empty(&self) -> bool {
        self.high_risks.is_empty()
            && self.medium_risks.is_empty()
            && self.low_risks.is_empty()
            && self.mitigation_strategies.is_empty()
            && self.success_factors.is_empty()
    }
}

/// Structured reading of a product image, as returned by the vision step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_category: String,
    pub visual_appeal_score: u8,
    pub design_quality: String,
    pub target_audience: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    pub market_positioning: String,
    #[serde(default)]
    pub branding_suggestions: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub image_format: Option<String>,
    #[serde(default)]
    pub image_bytes: usize,
    #[serde(default)]
    pub raw_response: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub overall_success_score: f64,
    pub market_demand_score: f64,
    pub concept_viability_score: f64,
    pub execution_difficulty_score: f64,

    pub market_insights: MarketInsights,
    pub branding_recommendations: BrandingRecommendations,
    pub competitive_analysis: CompetitiveAnalysis,
    pub financial_projections: FinancialProjections,
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub product_analysis: Option<ProductAnalysis>,

    pub executive_summary: String,
    #[serde(default)]
    pub key_recommendations: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,

    pub evaluation_date: DateTime<Utc>,
    pub model_version: String,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Processing,
    Completed,
    Error,
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvaluationStatus::Processing => "processing",
            EvaluationStatus::Completed => "completed",
            EvaluationStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub status: EvaluationStatus,
    pub progress: u8,
    pub concept: BusinessConcept,
    pub options: EvaluationOptions,
    pub result: Option<EvaluationResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvaluationRecord {
    pub fn new(id: String, concept: BusinessConcept, options: EvaluationOptions) -> Self {
        Self {
            id,
            status: EvaluationStatus::Processing,
            progress: 0,
            concept,
            options,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// The finished result, or the error explaining why it cannot be served.
    pub fn completed_result(&self) -> Result<&EvaluationResult> {
        match (self.status, self.result.as_ref()) {
            (EvaluationStatus::Completed, Some(result)) => Ok(result),
            _ => Err(FlowError::EvaluationNotCompleted {
                id: self.id.clone(),
            }),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) if !s.trim().is_empty() => STANDARD
                .decode(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demographics() -> Demographics {
        Demographics {
            age_min: 25,
            age_max: 45,
            income_range: IncomeRange::Middle,
            location: "Austin, TX".to_string(),
            interests: vec!["coffee".to_string()],
            gender: None,
            education_level: None,
            lifestyle: None,
        }
    }

    fn concept() -> BusinessConcept {
        BusinessConcept {
            concept_description: "Mobile espresso cart for office parks".to_string(),
            target_demographics: demographics(),
            product_info: ProductInfo {
                name: Some("CartBrew".to_string()),
                description: Some("Specialty coffee on wheels".to_string()),
                ..Default::default()
            },
            business_model: None,
            competitive_advantages: vec![],
            funding_requirements: None,
            timeline: None,
        }
    }

    #[test]
    fn test_valid_concept_passes() {
        assert!(concept().validate().is_ok());
    }

    #[test]
    fn test_age_max_below_min_rejected() {
        let mut c = concept();
        c.target_demographics.age_max = 20;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("age_max"));
    }

    #[test]
    fn test_age_out_of_bounds_rejected() {
        let mut c = concept();
        c.target_demographics.age_max = 101;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_description_or_image_required() {
        let mut c = concept();
        c.product_info.description = None;
        assert!(c.validate().is_err());

        c.product_info.image_data = Some(vec![0xff, 0xd8, 0xff, 0xe0]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_empty_concept_description_rejected() {
        let mut c = concept();
        c.concept_description = "   ".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_demographics_serialization_uses_snake_case() {
        let mut d = demographics();
        d.income_range = IncomeRange::UpperMiddle;
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["income_range"], "upper_middle");
        assert_eq!(value["age_min"], 25);

        let back: Demographics = serde_json::from_value(value).unwrap();
        assert_eq!(back.income_range, IncomeRange::UpperMiddle);
    }

    #[test]
    fn test_image_data_base64_in_json() {
        let json = serde_json::json!({
            "description": "A mug",
            "image_data": "iVBORw0KGgo="
        });
        let product: ProductInfo = serde_json::from_value(json).unwrap();
        assert_eq!(
            product.image_data.as_deref(),
            Some(&b"\x89PNG\r\n\x1a\n"[..])
        );
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            BusinessCategory::parse("food_beverage").unwrap(),
            BusinessCategory::FoodBeverage
        );
        assert!(BusinessCategory::parse("space_mining").is_err());
        assert_eq!(IncomeRange::parse("HIGH").unwrap(), IncomeRange::High);
    }

    #[test]
    fn test_record_requires_completion_for_result() {
        let record = EvaluationRecord::new("abc".to_string(), concept(), EvaluationOptions::default());
        assert_eq!(record.status, EvaluationStatus::Processing);
        assert!(matches!(
            record.completed_result(),
            Err(FlowError::EvaluationNotCompleted { .. })
        ));
    }
}
