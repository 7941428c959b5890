use crate::domain::error::FinsightError;
use crate::domain::model::{CacheEntry, VideoCacheEntry};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Backing store of the query cache
///
/// Implementations provide atomic single-key upsert; the managers add no
/// locking of their own. All timestamps are unix seconds.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an entry by its semantic key, expired or not
    async fn find_entry(&self, query_hash: &str) -> Result<Option<CacheEntry>, FinsightError>;

    /// Insert or overwrite the entry with the same `query_hash`
    async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), FinsightError>;

    async fn delete_entry(&self, query_hash: &str) -> Result<bool, FinsightError>;

    /// Non-expired entries of one intent, most recent first.
    ///
    /// Rows whose response cannot be read are skipped; rows without usable
    /// entities come back with `entities: None`.
    async fn live_entries_for_intent(
        &self,
        intent: &str,
        now: i64,
    ) -> Result<Vec<CacheEntry>, FinsightError>;

    async fn count_live(&self, now: i64) -> Result<usize, FinsightError>;

    async fn intent_distribution(&self, now: i64) -> Result<BTreeMap<String, usize>, FinsightError>;

    /// `(oldest, newest)` creation time among live entries
    async fn created_range(&self, now: i64) -> Result<Option<(i64, i64)>, FinsightError>;

    async fn delete_created_before(&self, cutoff: i64) -> Result<usize, FinsightError>;

    async fn delete_expired(&self, now: i64) -> Result<usize, FinsightError>;

    async fn close(&self) -> Result<(), FinsightError>;
}

/// Backing store of the video cache
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn find_video(&self, video_hash: &str) -> Result<Option<VideoCacheEntry>, FinsightError>;

    async fn upsert_video(&self, entry: &VideoCacheEntry) -> Result<(), FinsightError>;

    async fn delete_video(&self, video_hash: &str) -> Result<bool, FinsightError>;

    /// Non-expired videos, most recent first
    async fn live_videos(&self, now: i64) -> Result<Vec<VideoCacheEntry>, FinsightError>;

    async fn delete_videos_created_before(&self, cutoff: i64) -> Result<usize, FinsightError>;

    async fn delete_expired_videos(&self, now: i64) -> Result<usize, FinsightError>;

    async fn close(&self) -> Result<(), FinsightError>;
}
