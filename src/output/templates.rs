use crate::core::ai_client::AiClient;
use crate::core::branding::{BrandingGenerator, WebsiteCopy};
use crate::core::parsing::truncate_chars;
use crate::domain::model::{BusinessConcept, EvaluationResult};
use crate::output::escape_html;
use crate::utils::error::Result;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

const FEATURE_ICONS: [&str; 6] = ["🚀", "⭐", "💡", "🎯", "🔧", "📈"];
const PRIMARY_COLOR: &str = "#007bff";
const SECONDARY_COLOR: &str = "#6c757d";
const ACCENT_COLOR: &str = "#28a745";

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCard {
    pub icon: String,
    pub title: String,
    pub description: String,
}

/// "eco friendly" → "Eco Friendly"
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 產品特色最多三張，競爭優勢補到六張，不足三張時補預設卡片
pub fn feature_cards(concept: &BusinessConcept) -> Vec<FeatureCard> {
    let mut cards: Vec<FeatureCard> = concept
        .product_info
        .features
        .iter()
        .take(3)
        .enumerate()
        .map(|(i, feature)| FeatureCard {
            icon: FEATURE_ICONS[i % FEATURE_ICONS.len()].to_string(),
            title: title_case(feature),
            description: format!(
                "Experience the power of {} in our innovative solution.",
                feature.to_lowercase()
            ),
        })
        .collect();

    for (i, advantage) in concept.competitive_advantages.iter().take(3).enumerate() {
        if cards.len() >= 6 {
            break;
        }
        cards.push(FeatureCard {
            icon: FEATURE_ICONS[(i + 3) % FEATURE_ICONS.len()].to_string(),
            title: title_case(advantage),
            description: format!(
                "We excel in {} to deliver exceptional value.",
                advantage.to_lowercase()
            ),
        });
    }

    while cards.len() < 3 {
        cards.push(FeatureCard {
            icon: "✨".to_string(),
            title: "Quality Service".to_string(),
            description: "We are committed to delivering the highest quality service to our customers."
                .to_string(),
        });
    }
    cards
}

fn domain_slug(business_name: &str) -> String {
    business_name.to_lowercase().replace(' ', "")
}

pub fn render_landing_page(concept: &BusinessConcept, result: &EvaluationResult, copy: &WebsiteCopy) -> String {
    let branding = &result.branding_recommendations;
    let business_name = concept.product_info.display_name();
    let name = escape_html(&business_name);
    let primary = escape_html(&branding.color_or(0, PRIMARY_COLOR));
    let secondary = escape_html(&branding.color_or(1, SECONDARY_COLOR));
    let accent = escape_html(&branding.color_or(2, ACCENT_COLOR));

    let cards: String = feature_cards(concept)
        .iter()
        .map(|card| {
            format!(
                "<div class=\"feature-card\"><div class=\"feature-icon\">{}</div><h3>{}</h3><p>{}</p></div>\n",
                card.icon,
                escape_html(&card.title),
                escape_html(&card.description)
            )
        })
        .collect();

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{name} - {tagline}</title>
<meta name="description" content="{meta}">
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; line-height: 1.6; color: #333; }}
.container {{ max-width: 1200px; margin: 0 auto; padding: 0 20px; }}
header {{ background: {primary}; color: white; padding: 1rem 0; position: fixed; width: 100%; top: 0; z-index: 1000; }}
nav {{ display: flex; justify-content: space-between; align-items: center; }}
.logo {{ font-size: 1.5rem; font-weight: bold; }}
.nav-links {{ display: flex; list-style: none; gap: 2rem; }}
.nav-links a {{ color: white; text-decoration: none; }}
.hero {{ background: linear-gradient(135deg, {primary} 0%, {secondary} 100%); color: white; padding: 120px 0 80px; text-align: center; }}
.hero h1 {{ font-size: 3rem; margin-bottom: 1rem; }}
.hero p {{ font-size: 1.2rem; margin-bottom: 2rem; opacity: 0.9; }}
.cta-button {{ display: inline-block; background: {accent}; color: white; padding: 15px 30px; text-decoration: none; border-radius: 5px; font-weight: bold; }}
.features {{ padding: 80px 0; background: #f8f9fa; }}
.features h2 {{ text-align: center; margin-bottom: 3rem; font-size: 2.5rem; }}
.features-grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); gap: 2rem; }}
.feature-card {{ background: white; padding: 2rem; border-radius: 10px; box-shadow: 0 5px 15px rgba(0,0,0,0.1); text-align: center; }}
.feature-icon {{ font-size: 3rem; color: {primary}; margin-bottom: 1rem; }}
.about {{ padding: 80px 0; }}
.about h2 {{ font-size: 2.5rem; margin-bottom: 1rem; }}
.contact {{ background: {primary}; color: white; padding: 80px 0; text-align: center; }}
footer {{ background: #333; color: white; text-align: center; padding: 2rem 0; }}
@media (max-width: 768px) {{ .hero h1 {{ font-size: 2rem; }} .nav-links {{ display: none; }} }}
</style>
</head>
<body>
<header>
<nav class="container">
<div class="logo">{name}</div>
<ul class="nav-links">
<li><a href="#home">Home</a></li>
<li><a href="#features">Features</a></li>
<li><a href="#about">About</a></li>
<li><a href="#contact">Contact</a></li>
</ul>
</nav>
</header>
<section id="home" class="hero">
<div class="container">
<h1>{hero}</h1>
<p>{hero_subtext}</p>
<a href="#contact" class="cta-button">{cta}</a>
</div>
</section>
<section id="features" class="features">
<div class="container">
<h2>Why Choose {name}?</h2>
<div class="features-grid">
{cards}</div>
</div>
</section>
<section id="about" class="about">
<div class="container">
<h2>About {name}</h2>
<p>{about}</p>
<p>{mission}</p>
</div>
</section>
<section id="contact" class="contact">
<div class="container">
<h2>Ready to Get Started?</h2>
<p>Ready to experience the {name} difference? Contact us today to get started.</p>
<a href="mailto:info@{slug}.com" class="cta-button">Contact Us Today</a>
</div>
</section>
<footer>
<div class="container">
<p>&copy; {year} {name}. All rights reserved.</p>
<p>Generated by FlowCo AI Business Evaluation System</p>
</div>
</footer>
</body>
</html>
"##,
        name = name,
        tagline = escape_html(&branding.tagline()),
        meta = escape_html(&format!(
            "{} - {}",
            business_name,
            truncate_chars(&concept.concept_description, 150)
        )),
        primary = primary,
        secondary = secondary,
        accent = accent,
        hero = escape_html(&copy.hero),
        hero_subtext = escape_html(&copy.services),
        cta = escape_html(&copy.cta),
        cards = cards,
        about = escape_html(&copy.about),
        mission = escape_html(&format!(
            "At {}, we are dedicated to {}",
            business_name,
            concept.concept_description.to_lowercase()
        )),
        slug = escape_html(&domain_slug(&business_name)),
        year = result.evaluation_date.format("%Y"),
    )
}

pub fn render_business_card(concept: &BusinessConcept, result: &EvaluationResult) -> String {
    let branding = &result.branding_recommendations;
    let business_name = concept.product_info.display_name();
    let slug = escape_html(&domain_slug(&business_name));

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{name} - Business Card</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 0; padding: 20px; background: #f0f0f0; }}
.business-card {{ width: 3.5in; height: 2in; background: {primary}; color: white; padding: 20px; border-radius: 10px; box-shadow: 0 5px 15px rgba(0,0,0,0.3); position: relative; overflow: hidden; }}
.business-card::before {{ content: ''; position: absolute; top: -50%; right: -50%; width: 100%; height: 100%; background: {secondary}; border-radius: 50%; opacity: 0.1; }}
.card-content {{ position: relative; z-index: 1; }}
.business-name {{ font-size: 18px; font-weight: bold; margin-bottom: 5px; }}
.tagline {{ font-size: 12px; opacity: 0.9; margin-bottom: 15px; }}
.contact-info {{ font-size: 10px; line-height: 1.4; }}
</style>
</head>
<body>
<div class="business-card">
<div class="card-content">
<div class="business-name">{name}</div>
<div class="tagline">{tagline}</div>
<div class="contact-info">
<div>📧 info@{slug}.com</div>
<div>📱 (555) 123-4567</div>
<div>🌐 www.{slug}.com</div>
</div>
</div>
</div>
</body>
</html>
"#,
        name = escape_html(&business_name),
        tagline = escape_html(&branding.tagline()),
        primary = escape_html(&branding.color_or(0, PRIMARY_COLOR)),
        secondary = escape_html(&branding.color_or(1, SECONDARY_COLOR)),
        slug = slug,
    )
}

pub fn social_media_content(concept: &BusinessConcept, result: &EvaluationResult) -> Value {
    let name = concept.product_info.display_name();
    let description = &concept.concept_description;
    let lower = description.to_lowercase();
    let short: String = lower.chars().take(50).collect();
    let highlight = result
        .branding_recommendations
        .key_messaging
        .first()
        .cloned()
        .unwrap_or_else(|| "We deliver exceptional value!".to_string());

    json!({
        "facebook_posts": [
            format!("🚀 Exciting news! {name} is here to {lower}. Join us on this amazing journey! #Innovation #Business"),
            format!("✨ What makes {name} special? {highlight} #Quality #Service"),
            format!("🎯 Ready to transform your experience? {name} is your trusted partner for success. Contact us today! #Success #Partnership"),
        ],
        "twitter_posts": [
            format!("🚀 {name} is revolutionizing the way you {short}... #Innovation"),
            format!("✨ Why choose {name}? Because we deliver results that matter. #Results #Quality"),
            format!("🎯 Ready for change? {name} is here to help. Get started today! #GetStarted"),
        ],
        "instagram_captions": [
            format!("✨ Welcome to {name}! We're passionate about {lower}. Follow our journey! 📸 #Business #Passion #Journey"),
            format!("🌟 Behind the scenes at {name}. Every day we work to deliver exceptional value to our customers. #BehindTheScenes #Value #Customers"),
            format!("🚀 The future is here with {name}. Join us as we {lower}! #Future #Innovation #JoinUs"),
        ],
        "linkedin_posts": [
            format!("We're excited to announce {name}, a new venture focused on {description}. Our mission is to deliver exceptional value through innovation and dedication to our customers."),
            format!("At {name}, we believe in the power of {lower}. Our team is committed to excellence and customer satisfaction in everything we do."),
            format!("Looking for a partner who understands your needs? {name} combines expertise with innovation to deliver results that exceed expectations."),
        ],
    })
}

pub fn email_templates(concept: &BusinessConcept, result: &EvaluationResult) -> Value {
    let name = concept.product_info.display_name();
    let description = &concept.concept_description;
    let lower = description.to_lowercase();
    let messaging = &result.branding_recommendations.key_messaging;
    let first_message = messaging
        .first()
        .cloned()
        .unwrap_or_else(|| "Exceptional service".to_string());
    let bullets = messaging
        .iter()
        .take(3)
        .map(|m| format!("• {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    json!({
        "welcome_email": {
            "subject": format!("Welcome to {name}!"),
            "body": format!(
                "Dear Valued Customer,\n\nWelcome to {name}! We're thrilled to have you join our community.\n\n\
                 At {name}, we are dedicated to {lower}. Our team is committed to providing you with exceptional service and value.\n\n\
                 What you can expect from us:\n- {first_message}\n- Dedicated customer support\n- Innovative solutions tailored to your needs\n\n\
                 Thank you for choosing {name}. We look forward to serving you!\n\nBest regards,\nThe {name} Team"
            ),
        },
        "promotional_email": {
            "subject": format!("Discover What Makes {name} Different"),
            "body": format!(
                "Hello,\n\nAre you ready to experience the {name} difference?\n\n{description}\n\n\
                 Why choose us?\n{bullets}\n\n\
                 Ready to get started? Contact us today to learn more about how we can help you succeed.\n\n\
                 Best regards,\nThe {name} Team"
            ),
        },
        "follow_up_email": {
            "subject": format!("Thank you for your interest in {name}"),
            "body": format!(
                "Dear Potential Customer,\n\nThank you for your interest in {name}. We wanted to follow up and provide you with more information about our services.\n\n\
                 {description}\n\n\
                 Our commitment to you:\n- Quality service and support\n- Innovative solutions\n- Customer satisfaction guarantee\n\n\
                 We would love to discuss how {name} can help you achieve your goals. Please don't hesitate to reach out with any questions.\n\n\
                 Best regards,\nThe {name} Team"
            ),
        },
    })
}

/// Landing page, business card and marketing content for a finished evaluation.
pub struct TemplateGenerator {
    branding: BrandingGenerator,
}

impl TemplateGenerator {
    pub fn new(ai: Arc<AiClient>) -> Self {
        Self {
            branding: BrandingGenerator::new(ai),
        }
    }

    pub async fn landing_page(&self, concept: &BusinessConcept, result: &EvaluationResult) -> String {
        tracing::info!("🌐 Generating landing page");
        let copy = self
            .branding
            .generate_website_copy(concept, &result.branding_recommendations)
            .await;
        render_landing_page(concept, result, &copy)
    }

    pub fn business_card(&self, concept: &BusinessConcept, result: &EvaluationResult) -> String {
        tracing::info!("🪪 Generating business card");
        render_business_card(concept, result)
    }

    /// Zip archive with the landing page, business card, social posts and email templates.
    pub async fn marketing_kit(&self, concept: &BusinessConcept, result: &EvaluationResult) -> Result<Vec<u8>> {
        tracing::info!("📦 Generating marketing kit");
        let landing_page = self.landing_page(concept, result).await;
        let business_card = self.business_card(concept, result);
        let social = serde_json::to_string_pretty(&social_media_content(concept, result))?;
        let emails = serde_json::to_string_pretty(&email_templates(concept, result))?;

        let files: [(&str, &str); 4] = [
            ("landing_page.html", &landing_page),
            ("business_card.html", &business_card),
            ("social_media_content.json", &social),
            ("email_templates.json", &emails),
        ];

        // 在記憶體中建立 ZIP
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, content) in files {
            zip.start_file::<_, ()>(name, FileOptions::default())?;
            zip.write_all(content.as_bytes())?;
        }
        let cursor = zip.finish()?;
        let data = cursor.into_inner();

        tracing::debug!("Marketing kit: {} files, {} bytes", files.len(), data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Demographics, IncomeRange, ProductInfo};

    fn concept(features: &[&str], advantages: &[&str]) -> BusinessConcept {
        BusinessConcept {
            concept_description: "Refillable cleaning supplies delivered by bike".to_string(),
            target_demographics: Demographics {
                age_min: 25,
                age_max: 45,
                income_range: IncomeRange::Middle,
                location: "Austin, TX".to_string(),
                interests: vec![],
                gender: None,
                education_level: None,
                lifestyle: None,
            },
            product_info: ProductInfo {
                name: Some("Green Loop".to_string()),
                description: Some("Zero-waste refills".to_string()),
                features: features.iter().map(|s| s.to_string()).collect(),
                ..ProductInfo::default()
            },
            business_model: None,
            competitive_advantages: advantages.iter().map(|s| s.to_string()).collect(),
            funding_requirements: None,
            timeline: None,
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("eco FRIENDLY refills"), "Eco Friendly Refills");
    }

    #[test]
    fn test_feature_cards_pad_to_three() {
        let cards = feature_cards(&concept(&["fast delivery"], &[]));
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].title, "Fast Delivery");
        assert_eq!(cards[0].icon, "🚀");
        assert_eq!(cards[2].title, "Quality Service");
    }

    #[test]
    fn test_feature_cards_cap_at_six() {
        let cards = feature_cards(&concept(&["a1 x", "b2 x", "c3 x", "d4 x"], &["e5", "f6", "g7", "h8"]));
        assert_eq!(cards.len(), 6);
        assert_eq!(cards[3].icon, "🎯");
        assert!(cards[3].description.starts_with("We excel in e5"));
    }

    #[test]
    fn test_domain_slug() {
        assert_eq!(domain_slug("Green Loop"), "greenloop");
    }
}
