use crate::application::cache::QueryCache;
use crate::application::video::VideoCache;
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::{open_store, StoreHandles};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<QueryCache>,
    pub videos: Arc<VideoCache>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn with_store(handles: StoreHandles, config: Config) -> Self {
        let timeout = config.store.timeout();
        Self {
            queries: Arc::new(QueryCache::new(
                handles.queries,
                config.cache.clone(),
                timeout,
            )),
            videos: Arc::new(VideoCache::new(handles.videos, config.cache.clone(), timeout)),
            config: Arc::new(config),
        }
    }

    pub fn unavailable(config: Config) -> Self {
        Self {
            queries: Arc::new(QueryCache::unavailable(config.cache.clone())),
            videos: Arc::new(VideoCache::unavailable(config.cache.clone())),
            config: Arc::new(config),
        }
    }

    /// Open the configured backend.
    ///
    /// Never fails: when the store cannot be opened in time both caches run
    /// as pass-through misses.
    pub async fn connect(config: Config) -> Self {
        match tokio::time::timeout(config.store.timeout(), open_store(&config)).await {
            Ok(Ok(handles)) => {
                info!("Cache store connection established");
                Self::with_store(handles, config)
            }
            Ok(Err(e)) => {
                warn!("Cache store connection failed: {}", e);
                Self::unavailable(config)
            }
            Err(_) => {
                warn!(
                    "Cache store connection timed out after {} ms",
                    config.store.timeout_ms
                );
                Self::unavailable(config)
            }
        }
    }

    pub async fn close(&self) {
        self.queries.close().await;
        self.videos.close().await;
    }
}
