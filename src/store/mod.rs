pub mod disk;
pub mod memory;

use crate::core::cache::TransactionStore;
use crate::core::config::AppConfig;
use anyhow::Result;
use disk::DiskStore;
use memory::MemoryStore;
use std::sync::Arc;
use tracing::info;

/// Opens the store selected by `storage.persist`.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn TransactionStore>> {
    if !config.storage.persist {
        info!("Using in-memory transaction store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = config.default_data_path()?.join("cache");
    info!(path = %path.display(), "Using disk transaction store");
    Ok(Arc::new(DiskStore::open(&path)?))
}
