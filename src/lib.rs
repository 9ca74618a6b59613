pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod output;
pub mod utils;
pub mod web;

pub use adapters::{InMemoryStore, LocalStorage, ResultArchive};
pub use config::AppConfig;
pub use core::{AiClient, EvaluationEngine};
pub use domain::model::{BusinessConcept, EvaluationOptions, EvaluationResult};
pub use utils::error::{FlowError, Result};
pub use web::{router, serve, AppState};

#[cfg(feature = "cli")]
pub use config::cli::{EvaluateArgs, ServeArgs};
