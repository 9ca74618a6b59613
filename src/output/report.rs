use crate::domain::model::{BusinessConcept, EvaluationResult, FinancialProjections, RiskAssessment};
use crate::output::escape_html;
use crate::output::pdf::render_text_pdf;
use crate::utils::error::{FlowError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;
use std::str::FromStr;

pub const REPORT_TITLE: &str = "Business Evaluation Report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Html,
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Html => "text/html; charset=utf-8",
            ReportFormat::Markdown => "text/markdown; charset=utf-8",
            ReportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Html => "html",
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = FlowError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "html" => Ok(ReportFormat::Html),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(FlowError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// `business_evaluation_<id>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn report_filename(id: &str, format: ReportFormat, at: DateTime<Utc>) -> String {
    format!(
        "business_evaluation_{}_{}.{}",
        id,
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

pub fn rating_label(score: f64) -> &'static str {
    if score >= 80.0 {
        "Excellent"
    } else if score >= 65.0 {
        "Good"
    } else if score >= 50.0 {
        "Fair"
    } else {
        "Poor"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryScores {
    pub market_demand: f64,
    pub concept_viability: f64,
    pub execution_difficulty: f64,
    pub confidence_level: f64,
}

/// Quick-view digest of a finished evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub business_name: String,
    pub concept: String,
    pub overall_score: f64,
    pub rating: String,
    pub scores: SummaryScores,
    pub competition_level: String,
    pub market_size: String,
    pub top_recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub evaluation_date: DateTime<Utc>,
}

pub fn summary(concept: &BusinessConcept, result: &EvaluationResult) -> EvaluationSummary {
    EvaluationSummary {
        business_name: concept.product_info.display_name(),
        concept: concept.concept_description.clone(),
        overall_score: result.overall_success_score,
        rating: rating_label(result.overall_success_score).to_string(),
        scores: SummaryScores {
            market_demand: result.market_demand_score,
            concept_viability: result.concept_viability_score,
            execution_difficulty: result.execution_difficulty_score,
            confidence_level: result.confidence_level,
        },
        competition_level: result.market_insights.competition_level.clone(),
        market_size: result
            .market_insights
            .market_size
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        top_recommendations: result.key_recommendations.iter().take(3).cloned().collect(),
        next_steps: result.next_steps.iter().take(3).cloned().collect(),
        evaluation_date: result.evaluation_date,
    }
}

fn push_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("- None identified\n");
    }
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

pub fn render_markdown(concept: &BusinessConcept, result: &EvaluationResult) -> String {
    let mut md = String::new();
    let d = &concept.target_demographics;

    let _ = writeln!(md, "# {}\n", REPORT_TITLE);
    let _ = writeln!(md, "**Business:** {}  ", concept.product_info.display_name());
    let _ = writeln!(md, "**Generated:** {}  ", result.evaluation_date.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(md, "**Model version:** {}\n", result.model_version);

    md.push_str("## Business Concept\n\n");
    let _ = writeln!(md, "{}\n", concept.concept_description);
    let _ = writeln!(
        md,
        "Target: ages {}, income {}, {}\n",
        d.age_range(),
        d.income_range.label(),
        d.location
    );

    md.push_str("## Scores\n\n| Metric | Score |\n|---|---|\n");
    for (label, score) in [
        ("Overall Success", result.overall_success_score),
        ("Market Demand", result.market_demand_score),
        ("Concept Viability", result.concept_viability_score),
        ("Execution Difficulty", result.execution_difficulty_score),
        ("Confidence", result.confidence_level),
    ] {
        let _ = writeln!(md, "| {} | {:.1}/100 |", label, score);
    }
    let _ = writeln!(md, "\n**Rating:** {}\n", rating_label(result.overall_success_score));

    md.push_str("## Executive Summary\n\n");
    let _ = writeln!(md, "{}\n", result.executive_summary);

    let insights = &result.market_insights;
    md.push_str("## Market Insights\n\n");
    let _ = writeln!(md, "- Market size: {}", insights.market_size.as_deref().unwrap_or("Unknown"));
    let _ = writeln!(md, "- Competition level: {}", insights.competition_level);
    let _ = writeln!(md, "- Demographic fit: {:.1}/100", insights.demographic_fit_score);
    let _ = writeln!(md, "- Location demand: {:.1}/100\n", insights.location_demand_score);
    md.push_str("### Market Trends\n\n");
    push_list(&mut md, &insights.market_trends);
    md.push_str("\n### Target Market Analysis\n\n");
    let _ = writeln!(md, "{}\n", insights.target_market_analysis);

    let competition = &result.competitive_analysis;
    md.push_str("## Competitive Analysis\n\n### Direct Competitors\n\n");
    push_list(&mut md, &competition.direct_competitors);
    md.push_str("\n### Competitive Advantages\n\n");
    push_list(&mut md, &competition.competitive_advantages);
    md.push_str("\n### Market Gaps\n\n");
    push_list(&mut md, &competition.market_gaps);
    md.push('\n');

    let branding = &result.branding_recommendations;
    md.push_str("## Branding\n\n");
    let _ = writeln!(md, "**Positioning:** {}\n", branding.brand_positioning);
    md.push_str("### Key Messaging\n\n");
    push_list(&mut md, &branding.key_messaging);
    md.push_str("\n### Marketing Channels\n\n");
    push_list(&mut md, &branding.marketing_channels);
    if !branding.color_palette.is_empty() {
        let _ = writeln!(md, "\n**Color palette:** {}", branding.color_palette.join(", "));
    }
    md.push('\n');

    let financials = &result.financial_projections;
    if !financials.is_empty() {
        md.push_str("## Financial Projections\n\n");
        if let Some(costs) = &financials.startup_costs {
            let _ = writeln!(md, "- Startup costs: {}", costs);
        }
        for (period, revenue) in &financials.revenue_projections {
            let _ = writeln!(md, "- {} revenue: {}", period, revenue);
        }
        if let Some(break_even) = &financials.break_even_timeline {
            let _ = writeln!(md, "- Break-even: {}", break_even);
        }
        md.push('\n');
    }

    let risks = &result.risk_assessment;
    md.push_str("## Risk Assessment\n\n### High Risks\n\n");
    push_list(&mut md, &risks.high_risks);
    md.push_str("\n### Medium Risks\n\n");
    push_list(&mut md, &risks.medium_risks);
    md.push_str("\n### Low Risks\n\n");
    push_list(&mut md, &risks.low_risks);
    if !risks.mitigation_strategies.is_empty() {
        md.push_str("\n### Mitigation Strategies\n\n");
        for (risk, strategy) in &risks.mitigation_strategies {
            let _ = writeln!(md, "- **{}:** {}", risk, strategy);
        }
    }
    md.push('\n');

    md.push_str("## Key Recommendations\n\n");
    for (i, rec) in result.key_recommendations.iter().enumerate() {
        let _ = writeln!(md, "{}. {}", i + 1, rec);
    }
    md.push_str("\n## Next Steps\n\n");
    for (i, step) in result.next_steps.iter().enumerate() {
        let _ = writeln!(md, "{}. {}", i + 1, step);
    }

    md
}

fn html_list(items: &[String]) -> String {
    if items.is_empty() {
        return "<p><em>None identified</em></p>".to_string();
    }
    let body: String = items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect();
    format!("<ul>{}</ul>", body)
}

fn financials_html(financials: &FinancialProjections) -> String {
    if financials.is_empty() {
        return String::new();
    }
    let mut items = Vec::new();
    if let Some(costs) = &financials.startup_costs {
        items.push(format!("Startup costs: {}", costs));
    }
    for (period, revenue) in &financials.revenue_projections {
        items.push(format!("{} revenue: {}", period, revenue));
    }
    if let Some(break_even) = &financials.break_even_timeline {
        items.push(format!("Break-even: {}", break_even));
    }
    format!("<h2>Financial Projections</h2>\n{}\n", html_list(&items))
}

fn mitigation_html(risks: &RiskAssessment) -> String {
    if risks.mitigation_strategies.is_empty() {
        return String::new();
    }
    let body: String = risks
        .mitigation_strategies
        .iter()
        .map(|(risk, strategy)| {
            format!("<li><strong>{}:</strong> {}</li>", escape_html(risk), escape_html(strategy))
        })
        .collect();
    format!("<h3>Mitigation Strategies</h3>\n<ul>{}</ul>\n", body)
}

pub fn render_html(concept: &BusinessConcept, result: &EvaluationResult) -> String {
    let d = &concept.target_demographics;
    let name = escape_html(&concept.product_info.display_name());
    let insights = &result.market_insights;
    let competition = &result.competitive_analysis;
    let branding = &result.branding_recommendations;
    let risks = &result.risk_assessment;

    let score_rows: String = [
        ("Overall Success", result.overall_success_score),
        ("Market Demand", result.market_demand_score),
        ("Concept Viability", result.concept_viability_score),
        ("Execution Difficulty", result.execution_difficulty_score),
        ("Confidence", result.confidence_level),
    ]
    .iter()
    .map(|(label, score)| format!("<tr><td>{}</td><td>{:.1}/100</td></tr>", label, score))
    .collect();

    let ordered = |items: &[String]| -> String {
        let body: String = items
            .iter()
            .map(|item| format!("<li>{}</li>", escape_html(item)))
            .collect();
        format!("<ol>{}</ol>", body)
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title} - {name}</title>
<style>
body {{ font-family: 'Segoe UI', Arial, sans-serif; max-width: 900px; margin: 2rem auto; color: #333; line-height: 1.6; }}
h1 {{ color: #2c3e50; }}
h2 {{ border-bottom: 2px solid #3498db; padding-bottom: 4px; }}
table {{ border-collapse: collapse; }}
td {{ padding: 4px 16px; border-bottom: 1px solid #ddd; }}
.rating {{ font-size: 1.4rem; font-weight: bold; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p><strong>{name}</strong>, generated {date}</p>
<h2>Business Concept</h2>
<p>{concept}</p>
<p>Target: ages {ages}, income {income}, {location}</p>
<h2>Scores</h2>
<table>{score_rows}</table>
<p class="rating">Rating: {rating}</p>
<h2>Executive Summary</h2>
<p>{summary}</p>
<h2>Market Insights</h2>
<p>Market size: {market_size}<br>Competition level: {competition_level}<br>Demographic fit: {demographic_fit:.1}/100<br>Location demand: {location_demand:.1}/100</p>
<h3>Market Trends</h3>
{trends}
<h3>Target Market Analysis</h3>
<p>{target_analysis}</p>
<h2>Competitive Analysis</h2>
<h3>Direct Competitors</h3>
{direct}
<h3>Competitive Advantages</h3>
{advantages}
<h3>Market Gaps</h3>
{gaps}
<h2>Branding</h2>
<p><strong>Positioning:</strong> {positioning}</p>
<h3>Key Messaging</h3>
{messaging}
<h3>Marketing Channels</h3>
{channels}
{palette}{financials}<h2>Risk Assessment</h2>
<h3>High Risks</h3>
{high_risks}
<h3>Medium Risks</h3>
{medium_risks}
<h3>Low Risks</h3>
{low_risks}
{mitigation}<h2>Key Recommendations</h2>
{recommendations}
<h2>Next Steps</h2>
{next_steps}
</body>
</html>
"#,
        title = REPORT_TITLE,
        name = name,
        date = result.evaluation_date.format("%Y-%m-%d %H:%M UTC"),
        concept = escape_html(&concept.concept_description),
        ages = d.age_range(),
        income = escape_html(d.income_range.label()),
        location = escape_html(&d.location),
        score_rows = score_rows,
        rating = rating_label(result.overall_success_score),
        summary = escape_html(&result.executive_summary),
        market_size = escape_html(insights.market_size.as_deref().unwrap_or("Unknown")),
        competition_level = escape_html(&insights.competition_level),
        demographic_fit = insights.demographic_fit_score,
        location_demand = insights.location_demand_score,
        trends = html_list(&insights.market_trends),
        target_analysis = escape_html(&insights.target_market_analysis),
        direct = html_list(&competition.direct_competitors),
        advantages = html_list(&competition.competitive_advantages),
        gaps = html_list(&competition.market_gaps),
        positioning = escape_html(&branding.brand_positioning),
        messaging = html_list(&branding.key_messaging),
        channels = html_list(&branding.marketing_channels),
        palette = if branding.color_palette.is_empty() {
            String::new()
        } else {
            format!("<p><strong>Color palette:</strong> {}</p>\n", escape_html(&branding.color_palette.join(", ")))
        },
        financials = financials_html(&result.financial_projections),
        high_risks = html_list(&risks.high_risks),
        medium_risks = html_list(&risks.medium_risks),
        low_risks = html_list(&risks.low_risks),
        mitigation = mitigation_html(risks),
        recommendations = ordered(&result.key_recommendations),
        next_steps = ordered(&result.next_steps),
    )
}

pub fn render_json(concept: &BusinessConcept, result: &EvaluationResult) -> Result<String> {
    let document = json!({
        "business_concept": concept,
        "evaluation_result": result,
        "generated_at": Utc::now(),
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

/// 依格式產出報告內容
pub fn render(format: ReportFormat, concept: &BusinessConcept, result: &EvaluationResult) -> Result<Vec<u8>> {
    tracing::info!("📝 Rendering {} report", format.extension());
    match format {
        ReportFormat::Markdown => Ok(render_markdown(concept, result).into_bytes()),
        ReportFormat::Html => Ok(render_html(concept, result).into_bytes()),
        ReportFormat::Json => Ok(render_json(concept, result)?.into_bytes()),
        ReportFormat::Pdf => {
            let plain = render_markdown(concept, result)
                .lines()
                .map(|line| line.trim_start_matches('#').trim_start().replace("**", ""))
                .collect::<Vec<_>>()
                .join("\n");
            render_text_pdf(REPORT_TITLE, &plain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_parsing() {
        assert_eq!("PDF".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("markdown".parse::<ReportFormat>().unwrap().extension(), "md");
        assert!(matches!(
            "docx".parse::<ReportFormat>(),
            Err(FlowError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_report_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            report_filename("abc", ReportFormat::Json, at),
            "business_evaluation_abc_20240309_140507.json"
        );
    }

    #[test]
    fn test_rating_boundaries() {
        assert_eq!(rating_label(80.0), "Excellent");
        assert_eq!(rating_label(79.9), "Good");
        assert_eq!(rating_label(65.0), "Good");
        assert_eq!(rating_label(50.0), "Fair");
        assert_eq!(rating_label(49.9), "Poor");
    }
}
