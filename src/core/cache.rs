use crate::core::transaction::CachedTransaction;
use crate::core::window::PeriodWindow;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Durable keyed storage for mirrored transactions.
///
/// Writes are upserts keyed by `id`; rows are never deleted. Range queries
/// only see records with a `created_at`.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<CachedTransaction>>;

    async fn upsert(&self, record: CachedTransaction) -> Result<()> {
        self.upsert_batch(vec![record]).await
    }

    /// Writes every record or none of them. A later duplicate id in the same
    /// batch replaces an earlier one.
    async fn upsert_batch(&self, records: Vec<CachedTransaction>) -> Result<()>;

    /// Records with `start <= created_at <= end`, oldest first, optionally
    /// restricted to an exact `status`.
    async fn query_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        status: Option<&str>,
    ) -> Result<Vec<CachedTransaction>>;

    async fn query_window(&self, window: &PeriodWindow) -> Result<Vec<CachedTransaction>> {
        self.query_by_date_range(window.start, window.end, None)
            .await
    }

    async fn count(&self) -> Result<usize>;
}
