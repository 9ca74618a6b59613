use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use flowco::adapters::providers::{MockProvider, MockReply};
use flowco::config::toml_config::ProcessingConfig;
use flowco::core::{AiClient, ClientSettings, EvaluationStore, InputProcessor, LlmProvider};
use flowco::domain::model::{BusinessConcept, EvaluationOptions};
use flowco::{router, AppState, EvaluationEngine, InMemoryStore};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "flowco-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<dyn EvaluationStore>,
}

fn scripted_provider() -> MockProvider {
    MockProvider::new()
        .with_vision(true)
        .with_rule(
            "provide numerical scores",
            MockReply::text(
                "Market Demand Score: 78\nConcept Viability Score: 72\nExecution Difficulty Score: 40\nOverall Success Score: 70\nConfidence Level: 80",
            ),
        )
        .with_fallback(MockReply::text("- Focus on local partnerships\n- Build an online presence"))
}

fn app_with(providers: Vec<Arc<dyn LlmProvider>>) -> TestApp {
    let settings = ClientSettings {
        default_model: "mock-model".to_string(),
        vision_model: "mock-model".to_string(),
        retry_attempts: 1,
        retry_delay: Duration::from_millis(1),
    };
    let ai = Arc::new(AiClient::new(providers, settings));
    let engine = EvaluationEngine::new(ai, InputProcessor::new(&ProcessingConfig::default()), "1.0.0");
    let store: Arc<dyn EvaluationStore> = Arc::new(InMemoryStore::new());
    let state = AppState::new(Arc::new(engine), store.clone());
    TestApp {
        router: router(state),
        store,
    }
}

fn app() -> TestApp {
    let provider: Arc<dyn LlmProvider> = Arc::new(scripted_provider());
    app_with(vec![provider])
}

fn concept_json() -> Value {
    json!({
        "concept_description": "A neighborhood coffee shop with a co-working space",
        "target_demographics": {
            "age_min": 22,
            "age_max": 40,
            "income_range": "middle",
            "location": "Portland, OR",
            "interests": ["coffee", "remote work"]
        },
        "product_info": {
            "name": "Grind & Co",
            "description": "Specialty coffee with bookable desks",
            "category": "food_beverage",
            "features": ["Fast wifi", "Quiet zones"]
        },
        "competitive_advantages": ["Only co-working cafe in the area"]
    })
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), content_type)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let (status, body, _) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &TestApp, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body, _) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// 輪詢直到評估結束，回傳最後的 status 內容
async fn wait_for_finish(app: &TestApp, id: &str) -> Value {
    for _ in 0..500 {
        let (_, status) = get_json(app, &format!("/api/v1/status/{}", id)).await;
        if status["status"] != "processing" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("evaluation {} did not finish", id);
}

async fn submit(app: &TestApp) -> String {
    let (status, body) = post_json(app, "/api/v1/evaluate", &concept_json()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");
    body["evaluation_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_evaluate_then_fetch_results() {
    let app = app();
    let id = submit(&app).await;

    let status = wait_for_finish(&app, &id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);
    assert!(status["completed_at"].is_string());

    let (code, result) = get_json(&app, &format!("/api/v1/results/{}", id)).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(result["overall_success_score"], 70.0);
    assert_eq!(result["market_demand_score"], 78.0);
    assert_eq!(result["model_version"], "1.0.0");
    assert!(result["branding_recommendations"]["color_palette"].as_array().unwrap().len() > 3);

    let (code, summary) = get_json(&app, &format!("/api/v1/summary/{}", id)).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(summary["business_name"], "Grind & Co");
    assert_eq!(summary["rating"], "Good");

    let (code, listing) = get_json(&app, "/api/v1/evaluations").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["evaluations"][0]["evaluation_id"], id.as_str());
}

#[tokio::test]
async fn test_invalid_submissions_are_rejected() {
    let app = app();

    let mut no_description = concept_json();
    no_description["product_info"] = json!({ "name": "Nameless" });
    let (status, body) = post_json(&app, "/api/v1/evaluate", &no_description).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");

    let mut inverted_ages = concept_json();
    inverted_ages["target_demographics"]["age_min"] = json!(50);
    inverted_ages["target_demographics"]["age_max"] = json!(30);
    let (status, _) = post_json(&app, "/api/v1/evaluate", &inverted_ages).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::post("/api/v1/evaluate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.list().await.len(), 0);
}

#[tokio::test]
async fn test_unknown_and_unfinished_evaluations() {
    let app = app();

    let (status, body) = get_json(&app, "/api/v1/status/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["category"], "not_found");

    let concept: BusinessConcept = serde_json::from_value(concept_json()).unwrap();
    app.store
        .insert("pending", concept, EvaluationOptions::default())
        .await;

    let (status, _) = get_json(&app, "/api/v1/results/pending").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _, _) = get(&app, "/api/v1/report/pending?format=html").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(&app, "/api/v1/report/missing?format=html").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reports_and_generated_documents() {
    let app = app();
    let id = submit(&app).await;
    wait_for_finish(&app, &id).await;

    let (status, body, content_type) = get(&app, &format!("/api/v1/report/{}?format=markdown", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/markdown"));
    assert!(String::from_utf8(body).unwrap().starts_with("# Business Evaluation Report"));

    let (status, body, content_type) = get(&app, &format!("/api/v1/report/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(body.starts_with(b"%PDF-"));

    let (status, _, _) = get(&app, &format!("/api/v1/report/{}?format=docx", id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, content_type) = get(&app, &format!("/api/v1/landing-page/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Grind &amp; Co"));

    let (status, body, _) = get(&app, &format!("/api/v1/business-card/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let card = String::from_utf8(body).unwrap();
    assert!(card.contains("business-card"));
    assert!(card.contains("Grind &amp; Co"));

    let (status, body, content_type) = get(&app, &format!("/api/v1/marketing-kit/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/zip"));
    let mut archive = zip::ZipArchive::new(Cursor::new(body)).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "business_card.html",
            "email_templates.json",
            "landing_page.html",
            "social_media_content.json"
        ]
    );
}

#[tokio::test]
async fn test_evaluation_fails_without_provider() {
    let app = app_with(Vec::new());
    let id = submit(&app).await;

    let status = wait_for_finish(&app, &id).await;
    assert_eq!(status["status"], "error");
    assert!(status["error"].as_str().unwrap().contains("No AI provider"));

    let (code, body) = get_json(&app, &format!("/api/v1/results/{}", id)).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (_, health) = get_json(&app, "/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["ai_available"], false);
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"product_image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/v1/evaluate-with-image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

const FORM_FIELDS: [(&str, &str); 6] = [
    ("concept_description", "Handmade ceramic mugs sold online"),
    ("age_min", "25"),
    ("age_max", "45"),
    ("income_range", "upper_middle"),
    ("location", "Austin, TX"),
    ("product_features", "Dishwasher safe\nMade to order"),
];

#[tokio::test]
async fn test_evaluate_with_image_upload() {
    let provider = Arc::new(scripted_provider().with_rule(
        "Analyze this product image",
        MockReply::text("Product Category: Homeware\nVisual Appeal: 8/10\nStrengths:\n- Warm glaze"),
    ));
    let app = app_with(vec![provider.clone() as Arc<dyn LlmProvider>]);

    let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";
    let request = multipart_request(multipart_body(&FORM_FIELDS, Some(("mug.png", png))));
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["message"], "Evaluation started with image analysis.");

    let id = body["evaluation_id"].as_str().unwrap();
    let status = wait_for_finish(&app, id).await;
    assert_eq!(status["status"], "completed");

    let (_, result) = get_json(&app, &format!("/api/v1/results/{}", id)).await;
    assert_eq!(result["product_analysis"]["image_format"], "png");
    assert_eq!(result["product_analysis"]["product_category"], "Homeware");
    assert_eq!(result["product_analysis"]["visual_appeal_score"], 8);
    assert!(provider.prompts().iter().any(|p| p.contains("Analyze this product image")));
}

#[tokio::test]
async fn test_evaluate_with_image_rejects_bad_uploads() {
    let app = app();

    let request = multipart_request(multipart_body(&FORM_FIELDS, Some(("mug.bmp", b"BM0000000000"))));
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // location 缺少
    let request = multipart_request(multipart_body(&FORM_FIELDS[..4], None));
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("location"));
}

#[tokio::test]
async fn test_health_lists_providers() {
    let app = app();
    let (status, health) = get_json(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["ai_available"], true);
    assert_eq!(health["providers"], json!(["mock"]));
    assert_eq!(health["models"], json!(["mock-model"]));

    let (status, index) = get_json(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(index["endpoints"]["evaluate"].is_string());
}

fn jpeg_of_len(len: usize) -> Vec<u8> {
    let mut image = vec![0u8; len];
    image[..4].copy_from_slice(&[0xff, 0xd8, 0xff, 0xe0]);
    image
}

fn concept_with_image(image: &[u8]) -> Value {
    use base64::Engine;
    let mut concept = concept_json();
    concept["product_info"]["image_data"] = json!(base64::engine::general_purpose::STANDARD.encode(image));
    concept
}

#[tokio::test]
async fn test_json_image_at_size_limit_is_accepted() {
    let app = app();
    let limit = ProcessingConfig::default().max_image_size;

    let (status, body) = post_json(&app, "/api/v1/evaluate", &concept_with_image(&jpeg_of_len(limit))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    let (status, body) = post_json(&app, "/api/v1/evaluate", &concept_with_image(&jpeg_of_len(limit + 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");
    assert!(body["error"].as_str().unwrap().contains("product_image"));
}

#[tokio::test]
async fn test_oversized_bodies_return_json_errors() {
    let app = app();
    let limit = ProcessingConfig::default().max_image_size;

    // base64 後的 JSON 超過路由上限
    let oversized = "x".repeat(limit.div_ceil(3) * 4 + 2 * 1024 * 1024);
    let request = Request::post("/api/v1/evaluate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(oversized))
        .unwrap();
    let (status, body, content_type) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["category"], "validation");
    assert!(body["error"].as_str().unwrap().contains("byte limit"));

    // 表單內的圖片超過上限但整體仍在限制內
    let request = multipart_request(multipart_body(&FORM_FIELDS, Some(("mug.jpg", &jpeg_of_len(limit + 1)))));
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("limit is"));

    let request = multipart_request(multipart_body(&FORM_FIELDS, Some(("mug.jpg", &jpeg_of_len(limit + 2 * 1024 * 1024)))));
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["category"], "validation");
}
