use crate::core::ai_client::AiClient;
use crate::core::input::ImageFormat;
use crate::core::parsing::parse_list_response;
use crate::domain::model::{ProductAnalysis, ProductInfo};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Category,
    Appeal,
    Quality,
    Audience,
    Strengths,
    Weaknesses,
    Positioning,
    Branding,
}

impl Section {
    fn detect(line: &str) -> Option<Self> {
        let lower = line.to_lowercase();
        // 順序有意義：標題行可能同時出現多個關鍵字
        [
            ("product category", Section::Category),
            ("visual appeal", Section::Appeal),
            ("design quality", Section::Quality),
            ("target audience", Section::Audience),
            ("strengths", Section::Strengths),
            ("weaknesses", Section::Weaknesses),
            ("market positioning", Section::Positioning),
            ("branding", Section::Branding),
        ]
        .into_iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, section)| section)
    }
}

pub fn build_image_prompt(product: &ProductInfo) -> String {
    let features = if product.features.is_empty() {
        "None listed".to_string()
    } else {
        product.features.join(", ")
    };

    format!(
        "Analyze this product image and provide detailed insights:\n\n\
         Product Context:\n\
         - Name: {}\n\
         - Description: {}\n\
         - Features: {}\n\n\
         Please analyze and provide:\n\
         1. Product Category: What type of product is this?\n\
         2. Visual Appeal: Rate the visual appeal (1-10) and explain\n\
         3. Design Quality: Assess the design quality and professionalism\n\
         4. Target Audience: Who would this product appeal to?\n\
         5. Strengths: What are the visual strengths?\n\
         6. Weaknesses: What could be improved visually?\n\
         7. Market Positioning: How would you position this product?\n\
         8. Branding Suggestions: What branding approach would work?\n\n\
         Provide specific, actionable insights based on what you see in the image.",
        product.name.as_deref().unwrap_or("Unknown"),
        product.description.as_deref().unwrap_or("Not provided"),
        features
    )
}

/// 只有 `Label:` 開頭或短標題行才算段落標題，清單項目不算
fn header_section(line: &str) -> Option<Section> {
    match line.split_once(':') {
        Some((head, _)) => Section::detect(head),
        None if line.split_whitespace().count() <= 4 => Section::detect(line),
        None => None,
    }
}

/// Reads the section-by-section answer to [`build_image_prompt`].
pub fn parse_image_analysis(response: &str) -> ProductAnalysis {
    let mut analysis = ProductAnalysis {
        product_category: "Unknown".to_string(),
        visual_appeal_score: 5,
        design_quality: "Fair".to_string(),
        target_audience: "General".to_string(),
        market_positioning: "Standard".to_string(),
        raw_response: response.to_string(),
        ..ProductAnalysis::default()
    };

    let mut current: Option<Section> = None;
    for raw_line in response.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let header = if line.starts_with(['-', '*', '•']) {
            None
        } else {
            header_section(line)
        };
        let content = match header {
            Some(section) => {
                current = Some(section);
                line.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or("")
            }
            None => line,
        };
        let Some(section) = current else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        match section {
            Section::Category => analysis.product_category = content.to_string(),
            Section::Appeal => {
                if let Some(score) = content
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|part| !part.is_empty())
                    .and_then(|digits| digits.parse::<u8>().ok())
                {
                    analysis.visual_appeal_score = score.clamp(1, 10);
                }
            }
            Section::Quality => analysis.design_quality = content.to_string(),
            Section::Audience => analysis.target_audience = content.to_string(),
            Section::Positioning => analysis.market_positioning = content.to_string(),
            Section::Strengths => analysis.strengths.extend(parse_list_response(content)),
            Section::Weaknesses => analysis.weaknesses.extend(parse_list_response(content)),
            Section::Branding => analysis.branding_suggestions.extend(parse_list_response(content)),
        }
    }

    analysis
}

pub fn image_recommendations(analysis: &ProductAnalysis) -> Vec<String> {
    let mut recommendations = Vec::new();

    if analysis.visual_appeal_score < 6 {
        recommendations.push("Enhance visual appeal through better styling or presentation".to_string());
    }
    if analysis.design_quality.to_lowercase().contains("poor") {
        recommendations.push(
            "Consider using a higher quality image with better lighting and focus".to_string(),
        );
    }
    recommendations.extend(
        analysis
            .weaknesses
            .iter()
            .take(2)
            .map(|weakness| format!("Address visual weakness: {}", weakness)),
    );
    recommendations.extend([
        "Ensure the product is the main focus of the image".to_string(),
        "Use consistent lighting and background across product images".to_string(),
        "Consider multiple angles or lifestyle shots to showcase the product".to_string(),
    ]);
    recommendations.truncate(5);
    recommendations
}

pub struct VisionAnalyzer {
    ai: Arc<AiClient>,
}

impl VisionAnalyzer {
    pub fn new(ai: Arc<AiClient>) -> Self {
        Self { ai }
    }

    /// 失敗時回傳帶 error 欄位的分析結果，不中斷整體評估
    pub async fn analyze_product_image(&self, product: &ProductInfo) -> ProductAnalysis {
        let Some(image) = product.image_data.as_deref().filter(|data| !data.is_empty()) else {
            tracing::warn!("🖼️ No valid image data found");
            return ProductAnalysis {
                error: Some("No valid image data".to_string()),
                ..ProductAnalysis::default()
            };
        };

        let format = ImageFormat::sniff(image);
        let media_type = format.map(|f| f.media_type()).unwrap_or("image/jpeg");
        tracing::info!("🖼️ Analyzing product image ({} bytes, {})", image.len(), media_type);

        let prompt = build_image_prompt(product);
        match self.ai.analyze_image(image, media_type, &prompt, None).await {
            Ok(response) => {
                let mut analysis = parse_image_analysis(&response);
                analysis.recommendations = image_recommendations(&analysis);
                analysis.image_format = format.map(|f| f.as_str().to_string());
                analysis.image_bytes = image.len();
                analysis
            }
            Err(e) => {
                tracing::error!("🖼️ Product image analysis failed: {}", e);
                ProductAnalysis {
                    image_format: format.map(|f| f.as_str().to_string()),
                    image_bytes: image.len(),
                    error: Some(format!("Analysis failed: {}", e)),
                    ..ProductAnalysis::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::providers::{MockProvider, MockReply};
    use crate::core::ai_client::ClientSettings;
    use crate::domain::ports::LlmProvider;

    const RESPONSE: &str = "\
1. Product Category: Reusable water bottle
2. Visual Appeal: 7/10 - clean lines
3. Design Quality: Professional
4. Target Audience: Outdoor enthusiasts
5. Strengths:
- Minimalist look
- Strong color contrast
6. Weaknesses: Busy background
7. Market Positioning: Premium eco segment
8. Branding Suggestions:
- Earth tones";

    #[test]
    fn test_parse_image_analysis() {
        let analysis = parse_image_analysis(RESPONSE);
        assert_eq!(analysis.product_category, "Reusable water bottle");
        assert_eq!(analysis.visual_appeal_score, 7);
        assert_eq!(analysis.design_quality, "Professional");
        assert_eq!(analysis.target_audience, "Outdoor enthusiasts");
        assert_eq!(analysis.strengths, vec!["Minimalist look", "Strong color contrast"]);
        assert_eq!(analysis.weaknesses, vec!["Busy background"]);
        assert_eq!(analysis.market_positioning, "Premium eco segment");
        assert_eq!(analysis.branding_suggestions, vec!["Earth tones"]);
    }

    #[test]
    fn test_bullets_mentioning_section_names_stay_in_place() {
        let analysis = parse_image_analysis(
            "Strengths:\n- Consistent branding across packaging\n- Durable steel body\n\
             Weaknesses:\n- Busy background\n- Strengths of the logo are lost at small sizes",
        );
        assert_eq!(
            analysis.strengths,
            vec!["Consistent branding across packaging", "Durable steel body"]
        );
        assert_eq!(
            analysis.weaknesses,
            vec!["Busy background", "Strengths of the logo are lost at small sizes"]
        );
        assert!(analysis.branding_suggestions.is_empty());
    }

    #[test]
    fn test_recommendations_capped_at_five() {
        let analysis = ProductAnalysis {
            visual_appeal_score: 3,
            design_quality: "Poor".to_string(),
            weaknesses: vec!["Blurry".to_string(), "Dark".to_string(), "Cropped".to_string()],
            ..ProductAnalysis::default()
        };
        let recommendations = image_recommendations(&analysis);
        assert_eq!(recommendations.len(), 5);
        assert!(recommendations[2].contains("Blurry"));
    }

    #[test]
    fn test_defaults_for_unstructured_answer() {
        let analysis = parse_image_analysis("Looks fine to me.");
        assert_eq!(analysis.product_category, "Unknown");
        assert_eq!(analysis.visual_appeal_score, 5);

        let recommendations = image_recommendations(&analysis);
        assert_eq!(recommendations.len(), 4);
        assert!(recommendations[0].starts_with("Enhance visual appeal"));
    }

    #[tokio::test]
    async fn test_analyzer_records_format_and_size() {
        let mock: Arc<dyn LlmProvider> = Arc::new(
            MockProvider::new()
                .with_vision(true)
                .with_fallback(MockReply::text(RESPONSE)),
        );
        let ai = Arc::new(AiClient::new(
            vec![mock],
            ClientSettings {
                default_model: "mock-model".to_string(),
                vision_model: "mock-model".to_string(),
                ..ClientSettings::default()
            },
        ));

        let product = ProductInfo {
            image_data: Some(b"\x89PNG\r\n\x1a\n0123".to_vec()),
            ..ProductInfo::default()
        };
        let analysis = VisionAnalyzer::new(ai).analyze_product_image(&product).await;
        assert_eq!(analysis.image_format.as_deref(), Some("png"));
        assert_eq!(analysis.image_bytes, 12);
        assert!(analysis.error.is_none());
        assert!(!analysis.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_analyzer_without_provider_reports_error() {
        let ai = Arc::new(AiClient::new(Vec::new(), ClientSettings::default()));
        let product = ProductInfo {
            image_data: Some(b"\xff\xd8\xff\xe0000000000".to_vec()),
            ..ProductInfo::default()
        };
        let analysis = VisionAnalyzer::new(ai).analyze_product_image(&product).await;
        assert!(analysis.error.unwrap().contains("No AI provider"));
    }
}
