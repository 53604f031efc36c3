//! Paged listing of cached records, newest first.

use crate::core::analytics::{AggregationEngine, window_or_all};
use crate::core::transaction::CachedTransaction;
use crate::core::window::PeriodWindow;
use anyhow::{Result, bail};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Exact status match.
    pub status: Option<String>,
    /// `None` lists all time.
    pub window: Option<PeriodWindow>,
    pub skip: usize,
    pub limit: usize,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            status: None,
            window: None,
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TransactionFilter {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            bail!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.limit
            );
        }
        Ok(())
    }
}

/// Sorts newest first (ties by descending id) and cuts one page.
pub fn page(mut records: Vec<CachedTransaction>, skip: usize, limit: usize) -> Vec<CachedTransaction> {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    records.into_iter().skip(skip).take(limit).collect()
}

impl AggregationEngine {
    pub async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<CachedTransaction>> {
        filter.validate()?;
        let window = window_or_all(filter.window.as_ref());
        let records = match filter.status.as_deref() {
            Some(status) => self.records_with_status(&window, status).await?,
            None => self.records_in(&window).await?,
        };
        let matched = records.len();
        let listed = page(records, filter.skip, filter.limit);
        debug!(matched, listed = listed.len(), skip = filter.skip, "Listed transactions");
        Ok(listed)
    }
}
