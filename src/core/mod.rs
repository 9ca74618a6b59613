pub mod ai_client;
pub mod branding;
pub mod engine;
pub mod input;
pub mod market;
pub mod parsing;
pub mod vision;

pub use ai_client::{AiClient, ClientSettings, GenerationOptions};
pub use branding::{BrandingGenerator, WebsiteCopy};
pub use engine::EvaluationEngine;
pub use input::InputProcessor;
pub use crate::domain::ports::{EvaluationStore, LlmProvider, ProgressSink, Storage};
pub use crate::utils::error::Result;
