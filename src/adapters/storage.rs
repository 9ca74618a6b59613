use crate::domain::model::EvaluationResult;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Files under a base directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

/// Writes completed results as `<id>.json`.
#[derive(Debug, Clone)]
pub struct ResultArchive<S: Storage> {
    storage: S,
}

impl<S: Storage> ResultArchive<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn save(&self, id: &str, result: &EvaluationResult) -> Result<String> {
        let path = format!("{}.json", id);
        let body = serde_json::to_vec_pretty(result)?;
        self.storage.write_file(&path, &body).await?;
        tracing::info!("💾 Archived evaluation {} ({} bytes)", id, body.len());
        Ok(path)
    }

    pub async fn load(&self, id: &str) -> Result<EvaluationResult> {
        let data = self.storage.read_file(&format!("{}.json", id)).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}
