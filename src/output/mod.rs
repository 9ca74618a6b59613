pub mod pdf;
pub mod report;
pub mod templates;

pub use report::{EvaluationSummary, ReportFormat};
pub use templates::TemplateGenerator;

/// 轉義 HTML 特殊字元
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
