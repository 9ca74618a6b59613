//! REST API served with axum.
//!
//! Evaluations are accepted immediately and run on a background task;
//! clients poll `/api/v1/status/{id}` and then fetch results or documents.

pub mod handlers;

use crate::adapters::{InMemoryStore, LocalStorage, ResultArchive};
use crate::config::toml_config::AppConfig;
use crate::core::EvaluationEngine;
use crate::domain::ports::EvaluationStore;
use crate::output::TemplateGenerator;
use crate::utils::error::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

// multipart 表單除了圖片外的欄位空間
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EvaluationEngine>,
    pub store: Arc<dyn EvaluationStore>,
    pub templates: Arc<TemplateGenerator>,
    pub archive: Option<Arc<ResultArchive<LocalStorage>>>,
    pub supported_formats: Arc<Vec<String>>,
    pub max_image_size: usize,
}

impl AppState {
    pub fn new(engine: Arc<EvaluationEngine>, store: Arc<dyn EvaluationStore>) -> Self {
        let templates = Arc::new(TemplateGenerator::new(engine.ai().clone()));
        let defaults = crate::config::toml_config::ProcessingConfig::default();
        Self {
            engine,
            store,
            templates,
            archive: None,
            supported_formats: Arc::new(defaults.supported_formats),
            max_image_size: defaults.max_image_size,
        }
    }

    /// JSON submissions carry the image as base64, about 4/3 of the raw size.
    pub fn json_body_limit(&self) -> usize {
        self.max_image_size.div_ceil(3) * 4 + FORM_OVERHEAD_BYTES
    }

    pub fn form_body_limit(&self) -> usize {
        self.max_image_size + FORM_OVERHEAD_BYTES
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = Arc::new(EvaluationEngine::from_config(config)?);
        let store = InMemoryStore::with_max_records(config.server.max_stored_evaluations);
        let mut state = Self::new(engine, Arc::new(store));
        state.supported_formats = Arc::new(
            config
                .processing
                .supported_formats
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
        );
        state.max_image_size = config.processing.max_image_size;
        if let Some(dir) = config.output.archive_dir.as_deref().filter(|d| !d.is_empty()) {
            tracing::info!("💾 Archiving completed evaluations to {}", dir);
            state.archive = Some(Arc::new(ResultArchive::new(LocalStorage::new(dir))));
        }
        Ok(state)
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/evaluate",
            post(handlers::evaluate).layer(DefaultBodyLimit::max(state.json_body_limit())),
        )
        .route(
            "/evaluate-with-image",
            post(handlers::evaluate_with_image).layer(DefaultBodyLimit::max(state.form_body_limit())),
        )
        .route("/status/{id}", get(handlers::status))
        .route("/results/{id}", get(handlers::results))
        .route("/report/{id}", get(handlers::report))
        .route("/landing-page/{id}", get(handlers::landing_page))
        .route("/business-card/{id}", get(handlers::business_card))
        .route("/marketing-kit/{id}", get(handlers::marketing_kit))
        .route("/summary/{id}", get(handlers::summary))
        .route("/evaluations", get(handlers::list_evaluations))
        .route("/health", get(handlers::health));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("🌐 Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("🛑 Shutdown signal received");
        })
        .await?;
    Ok(())
}
