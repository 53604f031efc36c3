use crate::core::cache::TransactionStore;
use crate::core::transaction::CachedTransaction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const RECORDS_PARTITION: &str = "transactions";
const CREATED_INDEX_PARTITION: &str = "tx_by_created";

/// Fixed-width so that byte order matches chronological order.
const INDEX_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// fjall-backed store. Records are JSON values keyed by id, with a secondary
/// `created_at\0id` index for range scans.
pub struct DiskStore {
    keyspace: Keyspace,
    records: PartitionHandle,
    by_created: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let records =
            keyspace.open_partition(RECORDS_PARTITION, PartitionCreateOptions::default())?;
        let by_created =
            keyspace.open_partition(CREATED_INDEX_PARTITION, PartitionCreateOptions::default())?;
        debug!(path = %path.display(), "Opened disk store");

        Ok(Self {
            keyspace,
            records,
            by_created,
        })
    }

    fn read(&self, id: &str) -> Result<Option<CachedTransaction>> {
        match self.records.get(id)? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Corrupt cached record: {id}"))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

fn index_prefix(at: NaiveDateTime) -> String {
    at.format(INDEX_TIME_FORMAT).to_string()
}

fn index_key(at: NaiveDateTime, id: &str) -> String {
    format!("{}\0{}", index_prefix(at), id)
}

#[async_trait]
impl TransactionStore for DiskStore {
    async fn get(&self, id: &str) -> Result<Option<CachedTransaction>> {
        self.read(id)
    }

    async fn upsert_batch(&self, records: Vec<CachedTransaction>) -> Result<()> {
        let mut latest: HashMap<String, CachedTransaction> = HashMap::with_capacity(records.len());
        for record in records {
            latest.insert(record.id.clone(), record);
        }

        let mut batch = self.keyspace.batch();
        for (id, record) in &latest {
            let previous_key = self
                .read(id)?
                .and_then(|previous| previous.created_at)
                .map(|at| index_key(at, id));
            let next_key = record.created_at.map(|at| index_key(at, id));

            if let Some(previous_key) = previous_key {
                if Some(&previous_key) != next_key.as_ref() {
                    batch.remove(&self.by_created, previous_key);
                }
            }
            if let Some(next_key) = next_key {
                batch.insert(&self.by_created, next_key, id.as_str());
            }
            batch.insert(&self.records, id.as_str(), serde_json::to_vec(record)?);
        }

        batch.commit().context("Failed to commit batch")?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist batch")?;
        debug!(records = latest.len(), "Committed batch to disk store");
        Ok(())
    }

    async fn query_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        status: Option<&str>,
    ) -> Result<Vec<CachedTransaction>> {
        let lower = index_prefix(start);
        let upper = format!("{}\x01", index_prefix(end));

        let mut matched = Vec::new();
        for entry in self.by_created.range(lower..upper) {
            let (_, id) = entry?;
            let id = String::from_utf8_lossy(&id);
            let Some(record) = self.read(&id)? else {
                continue;
            };
            if status.is_none_or(|s| record.status.as_deref() == Some(s)) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::tests::record;
    use tempfile::tempdir;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[tokio::test]
    async fn test_disk_store_get_upsert() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        assert!(store.get("tx-1").await.unwrap().is_none());
        store
            .upsert(record("tx-1", "pending", Some("2026-01-01 10:00:00")))
            .await
            .unwrap();
        let stored = store.get("tx-1").await.unwrap().unwrap();
        assert_eq!(stored.status.as_deref(), Some("pending"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disk_store_range_is_inclusive_and_ordered() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store
            .upsert_batch(vec![
                record("late", "success", Some("2026-01-02 23:59:59")),
                record("early", "failed", Some("2026-01-02 00:00:00")),
                record("outside", "success", Some("2026-01-03 00:00:00")),
                record("undated", "success", None),
            ])
            .await
            .unwrap();

        let found = store
            .query_by_date_range(at("2026-01-02 00:00:00"), at("2026-01-02 23:59:59"), None)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);

        let failed = store
            .query_by_date_range(
                at("2026-01-01 00:00:00"),
                at("2026-01-31 00:00:00"),
                Some("failed"),
            )
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_disk_store_moves_index_when_created_at_changes() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store
            .upsert(record("tx-1", "success", Some("2026-01-01 10:00:00")))
            .await
            .unwrap();
        store
            .upsert(record("tx-1", "success", Some("2026-02-01 10:00:00")))
            .await
            .unwrap();

        let january = store
            .query_by_date_range(at("2026-01-01 00:00:00"), at("2026-01-31 23:59:59"), None)
            .await
            .unwrap();
        assert!(january.is_empty());
        let february = store
            .query_by_date_range(at("2026-02-01 00:00:00"), at("2026-02-28 23:59:59"), None)
            .await
            .unwrap();
        assert_eq!(february.len(), 1);
    }
}
