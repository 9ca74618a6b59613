use crate::domain::model::{
    BusinessConcept, EvaluationOptions, EvaluationRecord, EvaluationResult, EvaluationStatus,
};
use crate::domain::ports::{EvaluationStore, ProgressSink};
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local evaluation records; lost on restart.
///
/// With a record limit, the oldest finished evaluations are pruned on insert.
/// Records still processing are never pruned.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<HashMap<String, EvaluationRecord>>>,
    max_records: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 表示不限制
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            max_records: (max_records > 0).then_some(max_records),
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EvaluationStore for InMemoryStore {
    async fn insert(&self, id: &str, concept: BusinessConcept, options: EvaluationOptions) {
        let record = EvaluationRecord::new(id.to_string(), concept, options);
        let mut records = self.records.write().await;
        if let Some(max) = self.max_records {
            prune_finished(&mut records, max.saturating_sub(1));
        }
        records.insert(id.to_string(), record);
    }

    async fn get(&self, id: &str) -> Result<EvaluationRecord> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| FlowError::EvaluationNotFound { id: id.to_string() })
    }

    async fn set_progress(&self, id: &str, progress: u8) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            // 只接受處理中的紀錄，進度不倒退
            if record.status == EvaluationStatus::Processing {
                record.progress = record.progress.max(progress.min(100));
            }
        }
    }

    async fn complete(&self, id: &str, result: EvaluationResult) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.status = EvaluationStatus::Completed;
            record.progress = 100;
            record.result = Some(result);
            record.error = None;
            record.completed_at = Some(Utc::now());
        }
    }

    async fn fail(&self, id: &str, message: String) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.status = EvaluationStatus::Error;
            record.error = Some(message);
            record.completed_at = Some(Utc::now());
        }
    }

    async fn list(&self) -> Vec<EvaluationRecord> {
        let mut records: Vec<EvaluationRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }
}

/// 移除最舊的已結束紀錄，直到數量不超過 keep
fn prune_finished(records: &mut HashMap<String, EvaluationRecord>, keep: usize) {
    if records.len() <= keep {
        return;
    }
    let mut finished: Vec<(chrono::DateTime<Utc>, String)> = records
        .values()
        .filter(|r| r.status != EvaluationStatus::Processing)
        .map(|r| (r.completed_at.unwrap_or(r.created_at), r.id.clone()))
        .collect();
    finished.sort();

    let excess = records.len() - keep;
    let pruned = finished.len().min(excess);
    for (_, id) in finished.into_iter().take(excess) {
        records.remove(&id);
    }
    if pruned > 0 {
        tracing::debug!("🧹 Pruned {} finished evaluations", pruned);
    }
    if records.len() > keep {
        tracing::warn!("⚠️ {} evaluations still processing, store is over its limit", records.len());
    }
}

/// Forwards engine progress into the store record for one evaluation.
pub struct StoreProgress {
    store: Arc<dyn EvaluationStore>,
    id: String,
}

impl StoreProgress {
    pub fn new(store: Arc<dyn EvaluationStore>, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
        }
    }
}

#[async_trait]
impl ProgressSink for StoreProgress {
    async fn report(&self, progress: u8, phase: &str) {
        tracing::debug!("⏳ {} at {}% ({})", self.id, progress, phase);
        self.store.set_progress(&self.id, progress).await;
    }
}
