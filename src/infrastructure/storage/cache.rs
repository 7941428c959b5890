// In-memory store implementation using DashMap
use crate::domain::error::FinsightError;
use crate::domain::model::{CacheEntry, VideoCacheEntry};
use crate::domain::traits::{CacheStore, VideoStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A record plus its write sequence number
///
/// Every upsert takes a fresh number, like a SQLite `rowid` after
/// `INSERT OR REPLACE`, so same-second entries order by last write.
#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    value: T,
}

/// Thread-safe in-memory store
///
/// Same observable behaviour as the SQLite store, minus persistence.
pub struct MemoryStore {
    entries: DashMap<String, Stored<CacheEntry>>,
    videos: DashMap<String, Stored<VideoCacheEntry>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            videos: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn video_len(&self) -> usize {
        self.videos.len()
    }

    fn stamp<T>(&self, value: T) -> Stored<T> {
        Stored {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            value,
        }
    }

    fn live_entries(&self, now: i64) -> impl Iterator<Item = Stored<CacheEntry>> + '_ {
        self.entries
            .iter()
            .filter(move |stored| !stored.value.is_expired(now))
            .map(|stored| stored.value().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// 最新优先：created_at 降序，再按写入顺序降序
fn newest_first<T>(mut records: Vec<Stored<T>>, created_at: impl Fn(&T) -> i64) -> Vec<T> {
    records.sort_by_key(|stored| Reverse((created_at(&stored.value), stored.seq)));
    records.into_iter().map(|stored| stored.value).collect()
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn find_entry(&self, query_hash: &str) -> Result<Option<CacheEntry>, FinsightError> {
        Ok(self
            .entries
            .get(query_hash)
            .map(|stored| stored.value.clone()))
    }

    async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), FinsightError> {
        self.entries
            .insert(entry.query_hash.clone(), self.stamp(entry.clone()));
        Ok(())
    }

    async fn delete_entry(&self, query_hash: &str) -> Result<bool, FinsightError> {
        Ok(self.entries.remove(query_hash).is_some())
    }

    async fn live_entries_for_intent(
        &self,
        intent: &str,
        now: i64,
    ) -> Result<Vec<CacheEntry>, FinsightError> {
        let entries: Vec<Stored<CacheEntry>> = self
            .live_entries(now)
            .filter(|stored| stored.value.intent == intent)
            .collect();
        Ok(newest_first(entries, |entry| entry.created_at))
    }

    async fn count_live(&self, now: i64) -> Result<usize, FinsightError> {
        Ok(self.live_entries(now).count())
    }

    async fn intent_distribution(&self, now: i64) -> Result<BTreeMap<String, usize>, FinsightError> {
        let mut distribution = BTreeMap::new();
        for stored in self.live_entries(now) {
            *distribution.entry(stored.value.intent).or_insert(0) += 1;
        }
        Ok(distribution)
    }

    async fn created_range(&self, now: i64) -> Result<Option<(i64, i64)>, FinsightError> {
        Ok(self.live_entries(now).fold(None, |range, stored| {
            let created_at = stored.value.created_at;
            match range {
                None => Some((created_at, created_at)),
                Some((oldest, newest)) => Some((oldest.min(created_at), newest.max(created_at))),
            }
        }))
    }

    async fn delete_created_before(&self, cutoff: i64) -> Result<usize, FinsightError> {
        let before = self.entries.len();
        self.entries
            .retain(|_, stored| stored.value.created_at >= cutoff);
        Ok(before - self.entries.len())
    }

    async fn delete_expired(&self, now: i64) -> Result<usize, FinsightError> {
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.value.is_expired(now));
        Ok(before - self.entries.len())
    }

    async fn close(&self) -> Result<(), FinsightError> {
        Ok(())
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn find_video(&self, video_hash: &str) -> Result<Option<VideoCacheEntry>, FinsightError> {
        Ok(self
            .videos
            .get(video_hash)
            .map(|stored| stored.value.clone()))
    }

    async fn upsert_video(&self, entry: &VideoCacheEntry) -> Result<(), FinsightError> {
        self.videos
            .insert(entry.video_hash.clone(), self.stamp(entry.clone()));
        Ok(())
    }

    async fn delete_video(&self, video_hash: &str) -> Result<bool, FinsightError> {
        Ok(self.videos.remove(video_hash).is_some())
    }

    async fn live_videos(&self, now: i64) -> Result<Vec<VideoCacheEntry>, FinsightError> {
        let videos: Vec<Stored<VideoCacheEntry>> = self
            .videos
            .iter()
            .filter(|stored| !stored.value.is_expired(now))
            .map(|stored| stored.value().clone())
            .collect();
        Ok(newest_first(videos, |video| video.created_at))
    }

    async fn delete_videos_created_before(&self, cutoff: i64) -> Result<usize, FinsightError> {
        let before = self.videos.len();
        self.videos
            .retain(|_, stored| stored.value.created_at >= cutoff);
        Ok(before - self.videos.len())
    }

    async fn delete_expired_videos(&self, now: i64) -> Result<usize, FinsightError> {
        let before = self.videos.len();
        self.videos.retain(|_, stored| !stored.value.is_expired(now));
        Ok(before - self.videos.len())
    }

    async fn close(&self) -> Result<(), FinsightError> {
        Ok(())
    }
}
