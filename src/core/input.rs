use crate::config::toml_config::ProcessingConfig;
use crate::domain::model::{BusinessConcept, Demographics, ProductInfo};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// 依檔頭判斷格式；少於 10 bytes 一律視為無效
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() < 10 {
            return None;
        }
        if data.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if data.starts_with(b"RIFF") {
            Some(ImageFormat::Webp)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentiment {
    pub sentiment: String,
    pub confidence: f64,
    pub positive_indicators: usize,
    pub negative_indicators: usize,
}

const STOP_WORDS: [&str; 34] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must",
];
const MORE_STOP_WORDS: [&str; 5] = ["can", "this", "that", "these", "those"];

const POSITIVE_WORDS: [&str; 16] = [
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "innovative", "unique",
    "revolutionary", "successful", "profitable", "growing", "popular", "trending", "opportunity",
    "potential",
];
const NEGATIVE_WORDS: [&str; 15] = [
    "bad", "poor", "terrible", "awful", "difficult", "challenging", "expensive", "risky", "saturated",
    "declining", "competitive", "limited", "restricted", "problematic", "complex",
];

const LOCATION_ABBREVIATIONS: [(&str, &str); 7] = [
    ("Us", "US"),
    ("Usa", "USA"),
    ("Uk", "UK"),
    ("Ca", "CA"),
    ("Ny", "NY"),
    ("Tx", "TX"),
    ("Fl", "FL"),
];

fn disallowed_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s\-.,!?()&$%]").expect("valid clean pattern"))
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[a-zA-Z]+\b").expect("valid word pattern"))
}

/// Collapses whitespace and strips characters outside `\w \s - . , ! ? ( ) & $ %`.
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    disallowed_chars().replace_all(&collapsed, "").trim().to_string()
}

fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = true;
        }
    }
    result
}

/// `"austin, tx"` → `"Austin, TX"`.
pub fn standardize_location(location: &str) -> String {
    let titled = title_case(location);
    let mut current = String::new();
    let mut output = String::with_capacity(titled.len());

    // 逐字替換縮寫，避免誤改單字中的片段
    let flush = |word: &mut String, output: &mut String| {
        if !word.is_empty() {
            let replaced = LOCATION_ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == word.as_str())
                .map(|(_, full)| full.to_string())
                .unwrap_or_else(|| word.clone());
            output.push_str(&replaced);
            word.clear();
        }
    };

    for c in titled.chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else {
            flush(&mut current, &mut output);
            output.push(c);
        }
    }
    flush(&mut current, &mut output);
    output
}

/// Lower-cased words of at least three letters, stop words removed, first occurrence order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| word.len() >= 3)
        .filter(|word| !STOP_WORDS.contains(word) && !MORE_STOP_WORDS.contains(word))
        .filter(|word| seen.insert(word.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    let words: HashSet<&str> = word_pattern().find_iter(&lowered).map(|m| m.as_str()).collect();

    if words.is_empty() {
        return Sentiment {
            sentiment: "neutral".to_string(),
            confidence: 0.0,
            positive_indicators: 0,
            negative_indicators: 0,
        };
    }

    let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count();
    let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count();
    let spread = |diff: usize| (diff as f64 / words.len() as f64 * 10.0).min(0.8);

    let (sentiment, confidence) = if positive > negative {
        ("positive", spread(positive - negative))
    } else if negative > positive {
        ("negative", spread(negative - positive))
    } else {
        ("neutral", 0.5)
    };

    Sentiment {
        sentiment: sentiment.to_string(),
        confidence,
        positive_indicators: positive,
        negative_indicators: negative,
    }
}

fn clean_list(items: &[String], lowercase: bool) -> Vec<String> {
    items
        .iter()
        .filter(|item| !item.trim().is_empty())
        .map(|item| {
            if lowercase {
                clean_text(&item.to_lowercase())
            } else {
                clean_text(item)
            }
        })
        .collect()
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

fn clean_optional(value: &Option<String>) -> Option<String> {
    value.as_deref().map(clean_text)
}

/// Normalises a submitted concept before analysis.
#[derive(Debug, Clone)]
pub struct InputProcessor {
    max_image_size: usize,
}

impl InputProcessor {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            max_image_size: config.max_image_size,
        }
    }

    pub fn process(&self, concept: &BusinessConcept) -> BusinessConcept {
        tracing::debug!("🧹 Processing business concept input");

        if tracing::enabled!(tracing::Level::DEBUG) {
            let keywords = extract_keywords(&concept.concept_description);
            let sentiment = analyze_sentiment(&concept.concept_description);
            tracing::debug!(
                "Concept keywords: [{}], tone: {} ({:.2})",
                keywords.iter().take(10).cloned().collect::<Vec<_>>().join(", "),
                sentiment.sentiment,
                sentiment.confidence
            );
        }

        BusinessConcept {
            concept_description: clean_text(&concept.concept_description),
            target_demographics: self.process_demographics(&concept.target_demographics),
            product_info: self.process_product_info(&concept.product_info),
            business_model: clean_optional(&concept.business_model),
            competitive_advantages: clean_list(&concept.competitive_advantages, false),
            funding_requirements: concept.funding_requirements.clone(),
            timeline: concept.timeline.clone(),
        }
    }

    fn process_demographics(&self, demographics: &Demographics) -> Demographics {
        Demographics {
            age_min: demographics.age_min,
            age_max: demographics.age_max,
            income_range: demographics.income_range,
            location: standardize_location(&clean_text(&demographics.location)),
            interests: dedup_preserving_order(clean_list(&demographics.interests, true)),
            gender: demographics.gender.as_deref().map(|g| clean_text(&g.to_lowercase())),
            education_level: clean_optional(&demographics.education_level),
            lifestyle: clean_optional(&demographics.lifestyle),
        }
    }

    fn process_product_info(&self, product: &ProductInfo) -> ProductInfo {
        ProductInfo {
            name: clean_optional(&product.name),
            description: clean_optional(&product.description),
            image_data: product
                .image_data
                .as_deref()
                .filter(|data| self.validate_image(data).is_some())
                .map(<[u8]>::to_vec),
            category: product.category,
            price_range: clean_optional(&product.price_range),
            features: clean_list(&product.features, false),
        }
    }

    /// 尺寸與檔頭都合格才回傳格式；不合格只記錄警告
    pub fn validate_image(&self, data: &[u8]) -> Option<ImageFormat> {
        if data.is_empty() {
            return None;
        }
        if data.len() > self.max_image_size {
            tracing::warn!(
                "⚠️ Image data too large: {} bytes (max {})",
                data.len(),
                self.max_image_size
            );
            return None;
        }
        let format = ImageFormat::sniff(data);
        if format.is_none() {
            tracing::warn!("⚠️ Invalid image data format, ignoring image");
        }
        format
    }
}
