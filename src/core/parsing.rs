//! Turning free-form LLM text into typed values.
//!
//! Every parser here is total: malformed input degrades to an empty
//! collection or a neutral default, never an error.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const DEFAULT_SCORE: f64 = 50.0;

// 負號只在不緊接文字時才算，避免 "mid-50s" 被讀成 -50
fn number_pattern() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"(?:\B-)?\d+(?:\.\d+)?").expect("valid number pattern"))
}

fn label_pattern() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| {
        Regex::new(r"^([A-Z][A-Z0-9 /&'-]{1,48}):\s*(.*)$").expect("valid label pattern")
    })
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | '*' | '+' | ')') || c.is_whitespace())
        .trim()
}

fn is_bullet(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(['-', '*', '+', '•'])
        || trimmed
            .split_once(['.', ')'])
            .is_some_and(|(head, _)| !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()))
}

/// 一行一個項目；去掉編號與項目符號，太短 (<= 3 字元) 的略過
pub fn parse_list_response(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| strip_bullet(line.trim()).trim_start_matches('•').trim())
        .filter(|item| item.chars().count() > 3)
        .map(|item| item.trim_matches('*').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn parse_list_limited(response: &str, limit: usize) -> Vec<String> {
    let mut items = parse_list_response(response);
    items.truncate(limit);
    items
}

/// First number in the text, clamped to 0..=100; 50 when there is none.
pub fn extract_score(response: &str) -> f64 {
    number_pattern()
        .find(response)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(clamp_score)
        .unwrap_or(DEFAULT_SCORE)
}

pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// `Market Demand Score: 72` → `market_demand_score = 72.0`.
///
/// Keys listed in `required` are always present; missing ones get 50.
pub fn parse_score_block(response: &str, required: &[&str]) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();

    for line in response.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = snake_key(strip_bullet(key));
        if key.is_empty() {
            continue;
        }
        let Some(score) = number_pattern()
            .find(value)
            .and_then(|m| m.as_str().parse::<f64>().ok())
        else {
            continue;
        };

        if !(0.0..=100.0).contains(&score) {
            tracing::warn!("⚠️ Score {} for {} out of range, clamping", score, key);
        }
        scores.insert(key, clamp_score(score));
    }

    for key in required {
        scores.entry(key.to_string()).or_insert(DEFAULT_SCORE);
    }
    scores
}

fn snake_key(raw: &str) -> String {
    raw.trim()
        .trim_matches('*')
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledSection {
    /// Text on the label line plus any non-bullet continuation lines.
    pub text: String,
    /// Bullet lines under the label.
    pub items: Vec<String>,
}

impl LabeledSection {
    /// 有項目時用項目，否則把文字以逗號或分號拆開
    pub fn as_list(&self) -> Vec<String> {
        if !self.items.is_empty() {
            return self.items.clone();
        }
        self.text
            .split([',', ';'])
            .map(|part| part.trim().trim_end_matches('.').trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.items.is_empty()
    }
}

/// Splits `LABEL: value` blocks keyed by the upper-case label.
///
/// Markdown decoration (`#`, `**`) around labels is ignored. Text before
/// the first label is dropped.
pub fn parse_labeled_sections(response: &str) -> BTreeMap<String, LabeledSection> {
    let mut sections: BTreeMap<String, LabeledSection> = BTreeMap::new();
    let mut current: Option<String> = None;

    for raw_line in response.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            if let Some(section) = current.as_ref().and_then(|label| sections.get_mut(label)) {
                if !section.text.is_empty() && !section.text.ends_with("\n\n") {
                    section.text.push_str("\n\n");
                }
            }
            continue;
        }

        let undecorated = line.trim_start_matches('#').replace("**", "");
        let undecorated = undecorated.trim();
        if let Some(caps) = label_pattern().captures(undecorated) {
            let label = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
            let value = caps[2].trim().to_string();
            let section = sections.entry(label.clone()).or_default();
            if !value.is_empty() {
                section.text = value;
            }
            current = Some(label);
            continue;
        }

        let Some(section) = current.as_ref().and_then(|label| sections.get_mut(label)) else {
            continue;
        };
        if is_bullet(line) {
            let item = strip_bullet(line).trim_start_matches('•').trim();
            if !item.is_empty() {
                section.items.push(item.to_string());
            }
        } else {
            if !section.text.is_empty() && !section.text.ends_with("\n\n") {
                section.text.push(' ');
            }
            section.text.push_str(line);
        }
    }

    for section in sections.values_mut() {
        section.text = section.text.trim().to_string();
    }
    sections
}

/// Cuts at a char boundary and appends `...` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

pub fn join_or(items: &[String], limit: usize, fallback: &str) -> String {
    if items.is_empty() {
        return fallback.to_string();
    }
    items.iter().take(limit).cloned().collect::<Vec<_>>().join(", ")
}
