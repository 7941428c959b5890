pub mod cache;
pub mod db;

use crate::domain::error::FinsightError;
use crate::domain::traits::{CacheStore, VideoStore};
use crate::infrastructure::config::{get_database_path, Config, StoreBackend};
use cache::MemoryStore;
use db::SqliteStore;
use std::sync::Arc;

/// One backend seen through both cache interfaces
#[derive(Clone)]
pub struct StoreHandles {
    pub queries: Arc<dyn CacheStore>,
    pub videos: Arc<dyn VideoStore>,
}

impl StoreHandles {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CacheStore + VideoStore + 'static,
    {
        Self {
            queries: store.clone(),
            videos: store,
        }
    }
}

/// Open the backend named by `[store]`
pub async fn open_store(config: &Config) -> Result<StoreHandles, FinsightError> {
    config.validate()?;

    match config.store.backend {
        StoreBackend::Memory => Ok(StoreHandles::from_store(Arc::new(MemoryStore::new()))),
        StoreBackend::Sqlite => {
            let db_path = get_database_path(config);
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let store = SqliteStore::open(
                &db_path,
                &config.store.query_table,
                &config.store.video_table,
            )
            .await?;
            tracing::debug!("Opened cache database at {}", db_path.display());
            Ok(StoreHandles::from_store(Arc::new(store)))
        }
    }
}
