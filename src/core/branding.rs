use crate::core::ai_client::{AiClient, GenerationOptions};
use crate::core::parsing::{join_or, parse_labeled_sections, parse_list_limited};
use crate::domain::model::{
    BrandingRecommendations, BusinessCategory, BusinessConcept, MarketInsights, ProductAnalysis,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NOT_SPECIFIED: &str = "Not specified";
const MAX_PALETTE: usize = 8;

const DEFAULT_PALETTE: [&str; 5] = ["#3498DB", "#E74C3C", "#2ECC71", "#F39C12", "#9B59B6"];

fn base_palette(category: Option<BusinessCategory>) -> [&'static str; 5] {
    match category {
        Some(BusinessCategory::Technology) => ["#007ACC", "#4A90E2", "#50C878", "#FF6B35", "#2E3440"],
        Some(BusinessCategory::Retail) => ["#E74C3C", "#F39C12", "#27AE60", "#8E44AD", "#34495E"],
        Some(BusinessCategory::FoodBeverage) => ["#E67E22", "#C0392B", "#F1C40F", "#27AE60", "#8B4513"],
        Some(BusinessCategory::HealthFitness) => ["#2ECC71", "#3498DB", "#E74C3C", "#F39C12", "#95A5A6"],
        Some(BusinessCategory::Education) => ["#3498DB", "#9B59B6", "#E67E22", "#1ABC9C", "#34495E"],
        Some(BusinessCategory::Entertainment) => ["#E91E63", "#9C27B0", "#FF5722", "#FFC107", "#607D8B"],
        Some(BusinessCategory::Finance) => ["#2C3E50", "#34495E", "#1ABC9C", "#3498DB", "#95A5A6"],
        Some(BusinessCategory::ProfessionalServices) => {
            ["#34495E", "#2C3E50", "#3498DB", "#1ABC9C", "#95A5A6"]
        }
        _ => DEFAULT_PALETTE,
    }
}

fn parse_hex(color: &str) -> Option<(f64, f64, f64)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).ok().map(|v| f64::from(v) / 255.0)
    };
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return (0.0, 0.0, max);
    }
    let delta = max - min;
    let s = delta / max;
    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, max)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Opposite hue with the same saturation and value, as lowercase `#rrggbb`.
pub fn complementary_color(color: &str) -> Option<String> {
    let (r, g, b) = parse_hex(color)?;
    let (h, s, v) = rgb_to_hsv(r, g, b);
    let (r, g, b) = hsv_to_rgb((h + 0.5).rem_euclid(1.0), s, v);
    let to_byte = |c: f64| (c * 255.0) as u8;
    Some(format!("#{:02x}{:02x}{:02x}", to_byte(r), to_byte(g), to_byte(b)))
}

/// 類別基礎色盤，加上前兩色的互補色 (最多 8 色)
pub fn color_palette(category: Option<BusinessCategory>) -> Vec<String> {
    let base = base_palette(category);
    let mut palette: Vec<String> = base.iter().map(|c| c.to_string()).collect();
    for complement in base.iter().take(2).filter_map(|c| complementary_color(c)) {
        if !palette.contains(&complement) {
            palette.push(complement);
        }
    }
    palette.truncate(MAX_PALETTE);
    palette
}

/// Copy blocks for the generated landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteCopy {
    pub hero: String,
    pub about: String,
    pub services: String,
    pub cta: String,
}

impl Default for WebsiteCopy {
    fn default() -> Self {
        Self {
            hero: "Transform Your Business Today".to_string(),
            about: "We provide innovative solutions for modern businesses.".to_string(),
            services: "Our comprehensive services are designed to meet your needs.".to_string(),
            cta: "Get Started Now".to_string(),
        }
    }
}

/// Reads `HERO:`/`ABOUT:`/`SERVICES:`/`CTA:` lines; missing ones keep the default copy.
pub fn parse_website_copy(response: &str) -> WebsiteCopy {
    let sections = parse_labeled_sections(response);
    let mut copy = WebsiteCopy::default();
    let pick = |label: &str, slot: &mut String| {
        if let Some(text) = sections
            .get(label)
            .map(|section| section.text.trim())
            .filter(|text| !text.is_empty())
        {
            *slot = text.to_string();
        }
    };
    pick("HERO", &mut copy.hero);
    pick("ABOUT", &mut copy.about);
    pick("SERVICES", &mut copy.services);
    pick("CTA", &mut copy.cta);
    copy
}

pub struct BrandingGenerator {
    ai: Arc<AiClient>,
}

impl BrandingGenerator {
    pub fn new(ai: Arc<AiClient>) -> Self {
        Self { ai }
    }

    async fn ask(&self, step: &str, prompt: String, max_tokens: u32) -> Option<String> {
        match self
            .ai
            .generate_text(&prompt, &GenerationOptions::with_max_tokens(max_tokens))
            .await
        {
            Ok(response) => Some(response.trim().to_string()).filter(|r| !r.is_empty()),
            Err(e) => {
                tracing::warn!("🎨 {} failed, using fallback: {}", step, e);
                None
            }
        }
    }

    async fn ask_list(&self, step: &str, prompt: String, max_tokens: u32, limit: usize, fallback: &str) -> Vec<String> {
        self.ask(step, prompt, max_tokens)
            .await
            .map(|response| parse_list_limited(&response, limit))
            .filter(|items| !items.is_empty())
            .unwrap_or_else(|| vec![fallback.to_string()])
    }

    pub async fn generate_branding(
        &self,
        concept: &BusinessConcept,
        insights: &MarketInsights,
        product_analysis: Option<&ProductAnalysis>,
    ) -> BrandingRecommendations {
        tracing::info!("🎨 Generating branding recommendations");

        let d = &concept.target_demographics;
        let audience = format!("Age {}, {}", d.age_range(), d.income_range.label());
        let product = concept.product_info.description_or(NOT_SPECIFIED);
        let interests = join_or(&d.interests, usize::MAX, NOT_SPECIFIED);
        let trends = join_or(&insights.market_trends, 3, "None identified");

        let brand_positioning = self
            .ask(
                "Brand positioning",
                format!(
                    "Create a brand positioning statement for this business concept:\n\n\
                     Business Concept: {}\n\
                     Product/Service: {product}\n\
                     Target Demographics: {audience}, {}\n\
                     Competition Level: {}\n\
                     Key Market Trends: {trends}\n\n\
                     Create a clear, compelling brand positioning statement that:\n\
                     1. Defines the target audience\n\
                     2. Identifies the category/market\n\
                     3. States the unique value proposition\n\
                     4. Differentiates from competitors\n\n\
                     Format as a concise positioning statement (2-3 sentences).",
                    concept.concept_description, d.location, insights.competition_level,
                ),
                200,
            )
            .await
            .unwrap_or_else(|| "Brand positioning statement unavailable".to_string());

        let key_messaging = self
            .ask_list(
                "Key messaging",
                format!(
                    "Generate key marketing messages for this business concept:\n\n\
                     Business Concept: {}\n\
                     Product Features: {}\n\
                     Competitive Advantages: {}\n\
                     Target Audience: {audience}\n\n\
                     Create 5-7 key marketing messages that:\n\
                     1. Highlight unique benefits\n\
                     2. Address customer pain points\n\
                     3. Emphasize value proposition\n\
                     4. Resonate with target audience\n\
                     5. Differentiate from competitors\n\n\
                     Format as short, punchy messages, one per line.",
                    concept.concept_description,
                    join_or(&concept.product_info.features, usize::MAX, NOT_SPECIFIED),
                    join_or(&concept.competitive_advantages, usize::MAX, NOT_SPECIFIED),
                ),
                300,
                7,
                "Key messaging unavailable",
            )
            .await;

        let design_quality = product_analysis
            .filter(|analysis| analysis.error.is_none())
            .map(|analysis| analysis.design_quality.as_str())
            .unwrap_or("Not available");
        let visual_identity_suggestions = self
            .ask_list(
                "Visual identity",
                format!(
                    "Generate visual identity suggestions for this business concept:\n\n\
                     Business Concept: {}\n\
                     Product Category: {}\n\
                     Target Demographics: {audience}\n\
                     Product Analysis: {design_quality}\n\n\
                     Suggest visual identity elements including:\n\
                     1. Overall design style (modern, classic, minimalist, etc.)\n\
                     2. Typography recommendations\n\
                     3. Imagery style\n\
                     4. Visual tone and mood\n\
                     5. Brand personality expression\n\n\
                     Format as specific suggestions, one per line.",
                    concept.concept_description,
                    concept
                        .product_info
                        .category
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "General".to_string()),
                ),
                250,
                6,
                "Visual identity suggestions unavailable",
            )
            .await;

        let marketing_channels = self
            .ask_list(
                "Marketing channels",
                format!(
                    "Recommend marketing channels for this business concept:\n\n\
                     Business Concept: {}\n\
                     Target Demographics: {audience}, {}\n\
                     Target Interests: {interests}\n\
                     Market Size: {}\n\
                     Competition Level: {}\n\n\
                     Recommend 5-7 marketing channels considering:\n\
                     1. Target audience preferences\n\
                     2. Budget efficiency\n\
                     3. Market reach potential\n\
                     4. Competition level\n\
                     5. Local vs. digital opportunities\n\n\
                     Format as specific channels, one per line.",
                    concept.concept_description,
                    d.location,
                    insights.market_size.as_deref().unwrap_or("Unknown"),
                    insights.competition_level,
                ),
                200,
                7,
                "Marketing channel recommendations unavailable",
            )
            .await;

        let content_strategy = self
            .ask(
                "Content strategy",
                format!(
                    "Create a content marketing strategy for this business concept:\n\n\
                     Business Concept: {}\n\
                     Target Demographics: {audience}\n\
                     Target Interests: {interests}\n\
                     Market Trends: {trends}\n\n\
                     Provide a content strategy covering:\n\
                     1. Content themes and topics\n\
                     2. Content formats and types\n\
                     3. Publishing frequency and schedule\n\
                     4. Audience engagement approach\n\
                     5. Content distribution strategy\n\n\
                     Format as a comprehensive strategy (2-3 paragraphs).",
                    concept.concept_description,
                ),
                400,
            )
            .await
            .unwrap_or_else(|| "Content strategy unavailable".to_string());

        let logo_concepts = self
            .ask_list(
                "Logo concepts",
                format!(
                    "Generate logo concept ideas for this business:\n\n\
                     Business Concept: {}\n\
                     Product/Service: {product}\n\
                     Business Name: {}\n\n\
                     Create 5-6 logo concept ideas that:\n\
                     1. Reflect the business nature\n\
                     2. Appeal to target audience\n\
                     3. Are memorable and distinctive\n\
                     4. Work across different media\n\
                     5. Convey brand personality\n\n\
                     Format as concept descriptions, one per line.",
                    concept.concept_description,
                    concept.product_info.name.as_deref().unwrap_or(NOT_SPECIFIED),
                ),
                250,
                6,
                "Logo concept ideas unavailable",
            )
            .await;

        let commercial_script = self
            .ask(
                "Commercial script",
                format!(
                    "Create a 30-second commercial script for this business:\n\n\
                     Business Concept: {}\n\
                     Product/Service: {product}\n\
                     Brand Positioning: {brand_positioning}\n\
                     Target Audience: {audience}\n\n\
                     Create an engaging 30-second commercial script that:\n\
                     1. Grabs attention in the first 5 seconds\n\
                     2. Clearly communicates the value proposition\n\
                     3. Includes a strong call to action\n\
                     4. Resonates with the target audience\n\
                     5. Reflects the brand positioning\n\n\
                     Format as a proper script with scene descriptions and dialogue.",
                    concept.concept_description,
                ),
                400,
            )
            .await
            .unwrap_or_else(|| "Commercial script unavailable".to_string());

        BrandingRecommendations {
            brand_positioning,
            key_messaging,
            visual_identity_suggestions,
            marketing_channels,
            content_strategy,
            logo_concepts,
            color_palette: color_palette(concept.product_info.category),
            commercial_script: Some(commercial_script),
        }
    }

    pub async fn generate_website_copy(
        &self,
        concept: &BusinessConcept,
        branding: &BrandingRecommendations,
    ) -> WebsiteCopy {
        let prompt = format!(
            "Generate website copy for this business:\n\n\
             Business Concept: {}\n\
             Brand Positioning: {}\n\
             Key Messages: {}\n\n\
             Create copy for:\n\
             1. Hero headline (compelling, benefit-focused)\n\
             2. About section (2-3 sentences)\n\
             3. Services/Products section (brief description)\n\
             4. Call-to-action text\n\n\
             Format as:\n\
             HERO: [headline]\n\
             ABOUT: [about text]\n\
             SERVICES: [services text]\n\
             CTA: [call-to-action]",
            concept.concept_description,
            branding.brand_positioning,
            join_or(&branding.key_messaging, 3, NOT_SPECIFIED),
        );
        self.ask("Website copy", prompt, 300)
            .await
            .map(|response| parse_website_copy(&response))
            .unwrap_or_default()
    }
}
