//! 后端故障降级测试

use async_trait::async_trait;
use finsight_cache::domain::model::{intents, CacheEntry, VideoCacheEntry};
use finsight_cache::domain::traits::{CacheStore, VideoStore};
use finsight_cache::infrastructure::config::CacheConfig;
use finsight_cache::{CacheLookup, FinsightError, QueryCache, ResponseEnvelope, VideoCache};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(50);

/// A backend where every call fails, immediately or after hanging
struct BrokenStore {
    hang: bool,
}

impl BrokenStore {
    async fn fail<T>(&self) -> Result<T, FinsightError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Err(FinsightError::Io(std::io::Error::other("backend down")))
    }
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn find_entry(&self, _: &str) -> Result<Option<CacheEntry>, FinsightError> {
        self.fail().await
    }

    async fn upsert_entry(&self, _: &CacheEntry) -> Result<(), FinsightError> {
        self.fail().await
    }

    async fn delete_entry(&self, _: &str) -> Result<bool, FinsightError> {
        self.fail().await
    }

    async fn live_entries_for_intent(&self, _: &str, _: i64) -> Result<Vec<CacheEntry>, FinsightError> {
        self.fail().await
    }

    async fn count_live(&self, _: i64) -> Result<usize, FinsightError> {
        self.fail().await
    }

    async fn intent_distribution(&self, _: i64) -> Result<BTreeMap<String, usize>, FinsightError> {
        self.fail().await
    }

    async fn created_range(&self, _: i64) -> Result<Option<(i64, i64)>, FinsightError> {
        self.fail().await
    }

    async fn delete_created_before(&self, _: i64) -> Result<usize, FinsightError> {
        self.fail().await
    }

    async fn delete_expired(&self, _: i64) -> Result<usize, FinsightError> {
        self.fail().await
    }

    async fn close(&self) -> Result<(), FinsightError> {
        Ok(())
    }
}

#[async_trait]
impl VideoStore for BrokenStore {
    async fn find_video(&self, _: &str) -> Result<Option<VideoCacheEntry>, FinsightError> {
        self.fail().await
    }

    async fn upsert_video(&self, _: &VideoCacheEntry) -> Result<(), FinsightError> {
        self.fail().await
    }

    async fn delete_video(&self, _: &str) -> Result<bool, FinsightError> {
        self.fail().await
    }

    async fn live_videos(&self, _: i64) -> Result<Vec<VideoCacheEntry>, FinsightError> {
        self.fail().await
    }

    async fn delete_videos_created_before(&self, _: i64) -> Result<usize, FinsightError> {
        self.fail().await
    }

    async fn delete_expired_videos(&self, _: i64) -> Result<usize, FinsightError> {
        self.fail().await
    }

    async fn close(&self) -> Result<(), FinsightError> {
        Ok(())
    }
}

async fn assert_query_cache_degrades(store: BrokenStore) {
    let hang = store.hang;
    let cache = QueryCache::new(Arc::new(store), CacheConfig::default(), TIMEOUT);
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL");

    assert_eq!(
        cache.lookup("AAPL stock price", intents::PRICE_MOVEMENT).await,
        CacheLookup::Miss
    );
    assert!(cache
        .get_cached_response("AAPL stock price", intents::PRICE_MOVEMENT)
        .await
        .is_none());
    assert!(
        !cache
            .cache_response("AAPL stock price", intents::PRICE_MOVEMENT, &response)
            .await
    );
    assert_eq!(cache.clear_cache(24).await, 0);
    assert_eq!(cache.purge_expired().await, 0);

    let stats = cache.get_cache_stats().await;
    if hang {
        assert!(matches!(stats, Err(FinsightError::Timeout("count_live"))));
    } else {
        assert!(matches!(stats, Err(FinsightError::Io(_))));
    }
    cache.close().await;
}

async fn assert_video_cache_degrades(store: BrokenStore) {
    let cache = VideoCache::new(Arc::new(store), CacheConfig::default(), TIMEOUT);
    let url = "https://youtu.be/fed";

    assert!(cache.get_cached_video(url).await.is_none());
    assert!(
        !cache
            .cache_video_data(url, &json!({}), &json!({}), &json!({}))
            .await
    );
    assert!(cache.get_video_stats().await.is_err());
    assert_eq!(cache.clear_video_cache(24).await, 0);
    assert_eq!(cache.purge_expired().await, 0);
    assert!(cache.search_videos("fed").await.is_empty());
}

#[tokio::test]
async fn test_query_cache_backend_errors() {
    assert_query_cache_degrades(BrokenStore { hang: false }).await;
}

#[tokio::test]
async fn test_query_cache_backend_timeouts() {
    assert_query_cache_degrades(BrokenStore { hang: true }).await;
}

#[tokio::test]
async fn test_video_cache_backend_errors() {
    assert_video_cache_degrades(BrokenStore { hang: false }).await;
}

#[tokio::test]
async fn test_video_cache_backend_timeouts() {
    assert_video_cache_degrades(BrokenStore { hang: true }).await;
}
