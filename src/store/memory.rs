use crate::core::cache::TransactionStore;
use crate::core::transaction::CachedTransaction;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-process store, used when persistence is disabled and in tests.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, CachedTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<CachedTransaction>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn upsert_batch(&self, batch: Vec<CachedTransaction>) -> Result<()> {
        let mut records = self.records.write().await;
        debug!(records = batch.len(), "Committing batch to memory store");
        for record in batch {
            records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        status: Option<&str>,
    ) -> Result<Vec<CachedTransaction>> {
        let records = self.records.read().await;
        let mut matched: Vec<CachedTransaction> = records
            .values()
            .filter(|r| r.created_at.is_some_and(|at| start <= at && at <= end))
            .filter(|r| status.is_none_or(|s| r.status.as_deref() == Some(s)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matched)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
