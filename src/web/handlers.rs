use super::AppState;
use crate::adapters::StoreProgress;
use crate::domain::model::{
    BusinessCategory, BusinessConcept, Demographics, EvaluationOptions, EvaluationStatus, IncomeRange,
    ProductInfo,
};
use crate::output::report::{self, report_filename, ReportFormat};
use crate::utils::error::FlowError;
use crate::utils::validation::Validate;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// `FlowError` rendered as `{ "error": ..., "category": ... }`.
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("❌ {}", self.0);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "category": self.0.category(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(flatten)]
    pub concept: BusinessConcept,
    #[serde(flatten)]
    pub options: EvaluationOptions,
}

fn accepted(id: &str, message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "evaluation_id": id,
            "status": EvaluationStatus::Processing,
            "message": message,
        })),
    )
}

/// 存入紀錄並在背景執行評估
async fn start_evaluation(state: &AppState, concept: BusinessConcept, options: EvaluationOptions) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    state.store.insert(&id, concept.clone(), options).await;
    tracing::info!("📥 Evaluation {} accepted", id);

    let state = state.clone();
    let task_id = id.clone();
    tokio::spawn(async move {
        let progress = StoreProgress::new(state.store.clone(), task_id.clone());
        match state.engine.evaluate(&concept, options, &progress).await {
            Ok(result) => {
                if let Some(archive) = &state.archive {
                    if let Err(e) = archive.save(&task_id, &result).await {
                        tracing::warn!("⚠️ Could not archive evaluation {}: {}", task_id, e);
                    }
                }
                state.store.complete(&task_id, result).await;
                tracing::info!("✅ Evaluation {} completed", task_id);
            }
            Err(e) => {
                tracing::error!("❌ Evaluation {} failed: {}", task_id, e);
                state.store.fail(&task_id, e.to_string()).await;
            }
        }
    });

    id
}

fn check_image_size(image: Option<&[u8]>, limit: usize) -> Result<(), FlowError> {
    match image {
        Some(data) if data.len() > limit => Err(FlowError::validation(
            "product_image",
            format!("Image is {} bytes, limit is {}", data.len(), limit),
        )),
        _ => Ok(()),
    }
}

pub async fn evaluate(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            FlowError::PayloadTooLarge {
                limit: state.json_body_limit(),
            }
        } else {
            FlowError::validation("body", rejection.body_text())
        }
    })?;
    let request: EvaluateRequest = serde_json::from_slice(&body)
        .map_err(|e| FlowError::validation("body", format!("Invalid input data: {}", e)))?;
    check_image_size(request.concept.product_info.image_data.as_deref(), state.max_image_size)?;
    request.concept.validate()?;

    let id = start_evaluation(&state, request.concept, request.options).await;
    Ok(accepted(
        &id,
        "Evaluation started. Use the evaluation ID to check status and retrieve results.",
    ))
}

fn split_list(value: Option<&String>, separator: char) -> Vec<String> {
    value
        .map(|v| {
            v.split(separator)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, FlowError> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FlowError::validation(name, "field is required"))
}

fn optional(fields: &HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_age(fields: &HashMap<String, String>, name: &str) -> Result<u32, FlowError> {
    required(fields, name)?
        .parse()
        .map_err(|_| FlowError::validation(name, "must be a whole number"))
}

fn parse_flag(fields: &HashMap<String, String>, name: &str) -> bool {
    fields
        .get(name)
        .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
        .unwrap_or(true)
}

/// Builds a concept from multipart text fields.
///
/// Features and competitive advantages are one per line, interests are comma separated.
pub fn concept_from_form(
    fields: &HashMap<String, String>,
    image: Option<Vec<u8>>,
) -> Result<(BusinessConcept, EvaluationOptions), FlowError> {
    let category = optional(fields, "product_category")
        .map(|c| BusinessCategory::parse(&c))
        .transpose()?;

    let concept = BusinessConcept {
        concept_description: required(fields, "concept_description")?.to_string(),
        target_demographics: Demographics {
            age_min: parse_age(fields, "age_min")?,
            age_max: parse_age(fields, "age_max")?,
            income_range: IncomeRange::parse(required(fields, "income_range")?)?,
            location: required(fields, "location")?.to_string(),
            interests: split_list(fields.get("interests"), ','),
            gender: optional(fields, "gender"),
            education_level: optional(fields, "education_level"),
            lifestyle: optional(fields, "lifestyle"),
        },
        product_info: ProductInfo {
            name: optional(fields, "product_name"),
            description: optional(fields, "product_description"),
            image_data: image,
            category,
            price_range: optional(fields, "price_range"),
            features: split_list(fields.get("product_features"), '\n'),
        },
        business_model: optional(fields, "business_model"),
        competitive_advantages: split_list(fields.get("competitive_advantages"), '\n'),
        funding_requirements: optional(fields, "funding_requirements"),
        timeline: optional(fields, "timeline"),
    };

    let options = EvaluationOptions {
        include_branding: parse_flag(fields, "include_branding"),
        include_financial: parse_flag(fields, "include_financial"),
    };
    Ok((concept, options))
}

fn check_upload_extension(file_name: &str, supported: &[String]) -> Result<(), FlowError> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension {
        Some(ext) if supported.iter().any(|s| *s == ext) => Ok(()),
        Some(ext) => Err(FlowError::validation(
            "product_image",
            format!("Unsupported image type '.{}' (supported: {})", ext, supported.join(", ")),
        )),
        // 沒有副檔名時交給檔頭判斷
        None => Ok(()),
    }
}

pub async fn evaluate_with_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut fields = HashMap::new();
    let mut image = None;

    let limit = state.form_body_limit();
    let form_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            FlowError::PayloadTooLarge { limit }
        } else {
            FlowError::validation("form", format!("Invalid multipart body: {}", e))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "product_image" {
            if let Some(file_name) = field.file_name().map(str::to_string) {
                check_upload_extension(&file_name, &state.supported_formats)?;
            }
            let data = field.bytes().await.map_err(form_error)?;
            check_image_size(Some(&data[..]), state.max_image_size)?;
            if !data.is_empty() {
                image = Some(data.to_vec());
            }
        } else {
            let value = field.text().await.map_err(form_error)?;
            fields.insert(name, value);
        }
    }

    let (concept, options) = concept_from_form(&fields, image)?;
    concept.validate()?;

    let id = start_evaluation(&state, concept, options).await;
    Ok(accepted(&id, "Evaluation started with image analysis."))
}

pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let record = state.store.get(&id).await?;
    Ok(Json(json!({
        "evaluation_id": record.id,
        "status": record.status,
        "progress": record.progress,
        "created_at": record.created_at,
        "completed_at": record.completed_at,
        "error": record.error,
    })))
}

pub async fn results(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let record = state.store.get(&id).await?;
    match record.status {
        EvaluationStatus::Processing => Err(FlowError::EvaluationInProgress { id }.into()),
        EvaluationStatus::Error => Err(FlowError::EvaluationFailed {
            id,
            message: record.error.unwrap_or_else(|| "unknown error".to_string()),
        }
        .into()),
        EvaluationStatus::Completed => Ok(Json(record.completed_result()?).into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

pub async fn report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let record = state.store.get(&id).await?;
    let result = record.completed_result()?;
    let format: ReportFormat = query.format.as_deref().unwrap_or("pdf").parse()?;

    let body = report::render(format, &record.concept, result)?;
    let filename = report_filename(&id, format, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, format.media_type().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        body,
    )
        .into_response())
}

pub async fn landing_page(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Html<String>> {
    let record = state.store.get(&id).await?;
    let result = record.completed_result()?;
    Ok(Html(state.templates.landing_page(&record.concept, result).await))
}

pub async fn business_card(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Html<String>> {
    let record = state.store.get(&id).await?;
    let result = record.completed_result()?;
    Ok(Html(state.templates.business_card(&record.concept, result)))
}

pub async fn marketing_kit(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let record = state.store.get(&id).await?;
    let result = record.completed_result()?;
    let archive = state.templates.marketing_kit(&record.concept, result).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"marketing_kit_{}.zip\"", id),
            ),
        ],
        archive,
    )
        .into_response())
}

pub async fn summary(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<report::EvaluationSummary>> {
    let record = state.store.get(&id).await?;
    let result = record.completed_result()?;
    Ok(Json(report::summary(&record.concept, result)))
}

pub async fn list_evaluations(State(state): State<AppState>) -> Json<Value> {
    let records = state.store.list().await;
    let evaluations: Vec<Value> = records
        .iter()
        .map(|r| {
            json!({
                "evaluation_id": r.id,
                "status": r.status,
                "progress": r.progress,
                "created_at": r.created_at,
            })
        })
        .collect();
    Json(json!({ "total": evaluations.len(), "evaluations": evaluations }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let ai = state.engine.ai();
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "ai_available": ai.is_available(),
        "providers": ai.provider_names(),
        "models": ai.available_models(),
        "timestamp": Utc::now(),
    }))
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "FlowCo Business Evaluation API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "evaluate": "POST /api/v1/evaluate",
            "evaluate_with_image": "POST /api/v1/evaluate-with-image",
            "status": "GET /api/v1/status/{id}",
            "results": "GET /api/v1/results/{id}",
            "report": "GET /api/v1/report/{id}?format=pdf|html|markdown|json",
            "summary": "GET /api/v1/summary/{id}",
            "landing_page": "GET /api/v1/landing-page/{id}",
            "business_card": "GET /api/v1/business-card/{id}",
            "marketing_kit": "GET /api/v1/marketing-kit/{id}",
            "health": "GET /health",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_concept_from_form_splits_lists() {
        let fields = form(&[
            ("concept_description", "Pop-up ramen bar"),
            ("age_min", "21"),
            ("age_max", "40"),
            ("income_range", "middle"),
            ("location", "Chicago, IL"),
            ("interests", "food, nightlife,"),
            ("product_features", "Late hours\n\nVegan broth"),
            ("product_category", "food_beverage"),
            ("include_branding", "false"),
        ]);
        let (concept, options) = concept_from_form(&fields, None).unwrap();
        assert_eq!(concept.target_demographics.interests, vec!["food", "nightlife"]);
        assert_eq!(concept.product_info.features, vec!["Late hours", "Vegan broth"]);
        assert_eq!(concept.product_info.category, Some(BusinessCategory::FoodBeverage));
        assert!(!options.include_branding);
        assert!(options.include_financial);
    }

    #[test]
    fn test_concept_from_form_requires_fields() {
        let fields = form(&[("concept_description", "x"), ("age_min", "abc")]);
        let err = concept_from_form(&fields, None).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_upload_extension_check() {
        let supported = vec!["jpg".to_string(), "png".to_string()];
        assert!(check_upload_extension("photo.PNG", &supported).is_ok());
        assert!(check_upload_extension("photo.bmp", &supported).is_err());
        assert!(check_upload_extension("photo", &supported).is_ok());
    }
}
