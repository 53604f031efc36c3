//! Upstream-to-cache synchronization.

pub mod client;
pub mod merge;
pub mod scheduler;

use crate::core::cache::TransactionStore;
use chrono::{DateTime, Local, NaiveDate, Utc};
use client::TransactionSource;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed sync attempt, tagged with the phase that failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch page {page} from upstream")]
    Fetch { page: u32, source: BoxError },
    #[error("failed to merge {records} records into the cache")]
    Merge { records: usize, source: BoxError },
    #[error("a sync is already in progress")]
    InProgress,
}

impl SyncError {
    pub fn phase(&self) -> &'static str {
        match self {
            SyncError::Fetch { .. } => "fetch",
            SyncError::Merge { .. } => "merge",
            SyncError::InProgress => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Full,
    Daily,
}

impl Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncType::Full => write!(f, "full"),
            SyncType::Daily => write!(f, "daily"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub sync_type: SyncType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub inserted: usize,
    pub updated: usize,
    pub total: usize,
}

/// Drives fetch then merge. At most one sync runs at a time; an overlapping
/// call fails fast with [`SyncError::InProgress`].
pub struct SyncCoordinator {
    source: Arc<dyn TransactionSource>,
    store: Arc<dyn TransactionStore>,
    in_flight: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(source: Arc<dyn TransactionSource>, store: Arc<dyn TransactionStore>) -> Self {
        Self {
            source,
            store,
            in_flight: Mutex::new(()),
        }
    }

    /// Fetches every page without a day filter and merges them in one batch.
    pub async fn full_sync(&self) -> Result<SyncResult, SyncError> {
        self.run(SyncType::Full, None).await
    }

    /// Fetches and merges a single calendar day, today by default.
    pub async fn daily_sync(&self, date: Option<NaiveDate>) -> Result<SyncResult, SyncError> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        self.run(SyncType::Daily, Some(date)).await
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    async fn run(
        &self,
        sync_type: SyncType,
        day: Option<NaiveDate>,
    ) -> Result<SyncResult, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!(%sync_type, "Sync already in progress, dropping request");
            return Err(SyncError::InProgress);
        };

        let started_at = Utc::now();
        let timer = Instant::now();
        info!(%sync_type, day = ?day, "Starting sync");

        let records = self.source.fetch_all_pages(day).await?;
        let summary = merge::merge_records(self.store.as_ref(), &records, Utc::now())
            .await
            .map_err(|e| SyncError::Merge {
                records: records.len(),
                source: e.into(),
            })?;

        let result = SyncResult {
            sync_type,
            date: day,
            started_at,
            completed_at: Utc::now(),
            elapsed_seconds: timer.elapsed().as_secs_f64(),
            inserted: summary.inserted,
            updated: summary.updated,
            total: summary.total,
        };
        info!(
            %sync_type,
            inserted = result.inserted,
            updated = result.updated,
            total = result.total,
            elapsed_seconds = result.elapsed_seconds,
            "Sync completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use client::{PageMeta, TransactionPage};
    use serde_json::{Value, json};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Serves canned pages and records every requested day.
    #[derive(Default)]
    pub(crate) struct StaticSource {
        pub(crate) pages: Vec<Vec<Value>>,
        pub(crate) fail_on_page: Option<u32>,
        pub(crate) days: StdMutex<Vec<Option<NaiveDate>>>,
    }

    #[async_trait]
    impl TransactionSource for StaticSource {
        async fn fetch_page(&self, day: Option<NaiveDate>, page: u32) -> Result<TransactionPage> {
            self.days.lock().unwrap().push(day);
            if self.fail_on_page == Some(page) {
                return Err(anyhow!("upstream unavailable"));
            }
            let data = self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(TransactionPage {
                data,
                meta: PageMeta {
                    current_page: page,
                    last_page: self.pages.len().max(1) as u32,
                },
            })
        }
    }

    struct GatedSource {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TransactionSource for GatedSource {
        async fn fetch_page(&self, _day: Option<NaiveDate>, _page: u32) -> Result<TransactionPage> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(TransactionPage {
                data: vec![],
                meta: PageMeta::default(),
            })
        }
    }

    fn tx(id: &str) -> Value {
        json!({"id": id, "amount": 100, "status": "success", "created_at": "2026-01-01T10:00:00Z"})
    }

    #[tokio::test]
    async fn test_full_sync_merges_all_pages() {
        let source = Arc::new(StaticSource {
            pages: vec![vec![tx("a"), tx("b")], vec![tx("c")]],
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::new());
        let coordinator = SyncCoordinator::new(source.clone(), store.clone());

        let result = coordinator.full_sync().await.unwrap();
        assert_eq!(result.sync_type, SyncType::Full);
        assert_eq!(result.inserted, 3);
        assert_eq!(result.updated, 0);
        assert_eq!(result.total, 3);
        assert!(result.date.is_none());
        assert!(result.completed_at >= result.started_at);
        assert_eq!(*source.days.lock().unwrap(), vec![None, None]);

        let again = coordinator.full_sync().await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.updated, 3);
    }

    #[tokio::test]
    async fn test_daily_sync_filters_by_day() {
        let source = Arc::new(StaticSource {
            pages: vec![vec![tx("a")]],
            ..Default::default()
        });
        let coordinator = SyncCoordinator::new(source.clone(), Arc::new(MemoryStore::new()));
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        let result = coordinator.daily_sync(Some(day)).await.unwrap();
        assert_eq!(result.sync_type, SyncType::Daily);
        assert_eq!(result.date, Some(day));
        assert_eq!(*source.days.lock().unwrap(), vec![Some(day)]);

        coordinator.daily_sync(None).await.unwrap();
        let today = Local::now().date_naive();
        assert_eq!(source.days.lock().unwrap().last(), Some(&Some(today)));
    }

    #[tokio::test]
    async fn test_fetch_failure_persists_nothing() {
        let source = Arc::new(StaticSource {
            pages: vec![vec![tx("a")], vec![tx("b")]],
            fail_on_page: Some(2),
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::new());
        let coordinator = SyncCoordinator::new(source, store.clone());

        let err = coordinator.full_sync().await.unwrap_err();
        assert_eq!(err.phase(), "fetch");
        assert!(matches!(err, SyncError::Fetch { page: 2, .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_sync_is_dropped() {
        let source = Arc::new(GatedSource {
            started: Notify::new(),
            release: Notify::new(),
        });
        let coordinator = Arc::new(SyncCoordinator::new(
            source.clone(),
            Arc::new(MemoryStore::new()),
        ));

        let running = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.full_sync().await }
        });
        source.started.notified().await;
        assert!(coordinator.is_syncing());

        let overlapping = coordinator.daily_sync(None).await;
        assert!(matches!(overlapping, Err(SyncError::InProgress)));

        source.release.notify_one();
        running.await.unwrap().unwrap();
        assert!(!coordinator.is_syncing());
    }
}
