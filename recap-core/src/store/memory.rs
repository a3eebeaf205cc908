use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SummaryStore;
use crate::error::RecapError;
use crate::models::{NewSummary, Summary, SummaryFilter};

/// In-process store. Contents are lost when the process exits.
#[derive(Debug)]
pub struct MemorySummaryStore {
    summaries: RwLock<Vec<Summary>>,
}

impl Default for MemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self {
            summaries: RwLock::new(Vec::new()),
        }
    }

    /// Insert a fully formed record, keeping its timestamps.
    pub async fn insert(&self, summary: Summary) {
        self.summaries.write().await.push(summary);
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn create(&self, new: NewSummary) -> Result<Summary, RecapError> {
        let summary = Summary::from_new(new, Utc::now());
        self.summaries.write().await.push(summary.clone());
        tracing::info!(id = %summary.id, "Created summary (memory)");
        Ok(summary)
    }

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<Summary>, RecapError> {
        let guard = self.summaries.read().await;
        // Reverse first so equal timestamps keep newest-inserted first.
        let mut matching: Vec<Summary> = guard
            .iter()
            .rev()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Summary>, RecapError> {
        Ok(self.summaries.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Summary>, RecapError> {
        let mut guard = self.summaries.write().await;
        Ok(guard
            .iter()
            .position(|s| s.id == id)
            .map(|idx| guard.remove(idx)))
    }

    async fn health(&self) -> Result<String, RecapError> {
        let count = self.summaries.read().await.len();
        Ok(format!("in-memory ({} summaries)", count))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
