// Video transcription cache: exact URL identity, no similarity matching
use crate::application::{bounded, preview};
use crate::domain::error::FinsightError;
use crate::domain::key::video_hash;
use crate::domain::model::{
    timestamp_to_datetime, CachedVideo, ChannelCount, VideoCacheEntry, VideoStats, VideoSummary,
};
use crate::domain::traits::VideoStore;
use crate::infrastructure::config::CacheConfig;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const TOP_CHANNELS: usize = 5;
const SEARCH_LIMIT: usize = 10;

pub struct VideoCache {
    store: Option<Arc<dyn VideoStore>>,
    config: CacheConfig,
    timeout: Duration,
}

impl VideoCache {
    pub fn new(store: Arc<dyn VideoStore>, config: CacheConfig, timeout: Duration) -> Self {
        Self {
            store: Some(store),
            config,
            timeout,
        }
    }

    pub fn unavailable(config: CacheConfig) -> Self {
        Self {
            store: None,
            config,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    fn active_store(&self) -> Option<&Arc<dyn VideoStore>> {
        if !self.config.enabled {
            return None;
        }
        self.store.as_ref()
    }

    pub async fn get_cached_video(&self, video_url: &str) -> Option<CachedVideo> {
        let store = self.active_store()?;

        match self.try_get(store, video_url).await {
            Ok(video) => video,
            Err(e) => {
                warn!("Error retrieving cached video: {}", e);
                None
            }
        }
    }

    async fn try_get(
        &self,
        store: &Arc<dyn VideoStore>,
        video_url: &str,
    ) -> Result<Option<CachedVideo>, FinsightError> {
        let hash = video_hash(video_url);
        let now = Utc::now().timestamp();

        if let Some(entry) = bounded(self.timeout, "find_video", store.find_video(&hash)).await? {
            if !entry.is_expired(now) {
                info!("Video cache hit for URL: {}", preview(video_url));
                return Ok(Some(CachedVideo {
                    cached_at: timestamp_to_datetime(entry.created_at),
                    video_info: entry.video_info,
                    transcript: entry.transcript,
                    analysis: entry.analysis,
                }));
            }
            bounded(self.timeout, "delete_video", store.delete_video(&hash)).await?;
            info!("Expired video cache removed for URL: {}", preview(video_url));
        }

        info!("Video cache miss for URL: {}", preview(video_url));
        Ok(None)
    }

    pub async fn cache_video_data(
        &self,
        video_url: &str,
        video_info: &Value,
        transcript: &Value,
        analysis: &Value,
    ) -> bool {
        let Some(store) = self.active_store() else {
            return false;
        };

        let entry = VideoCacheEntry::new(
            video_url,
            video_info.clone(),
            transcript.clone(),
            analysis.clone(),
            Utc::now().timestamp(),
            self.config.ttl_secs,
        );

        match bounded(self.timeout, "upsert_video", store.upsert_video(&entry)).await {
            Ok(()) => {
                info!("Cached video data for URL: {}", preview(video_url));
                true
            }
            Err(e) => {
                warn!("Error caching video data: {}", e);
                false
            }
        }
    }

    pub async fn get_video_stats(&self) -> Result<VideoStats, FinsightError> {
        let store = self.store.as_ref().ok_or(FinsightError::Unavailable)?;
        let now = Utc::now().timestamp();
        let videos = bounded(self.timeout, "live_videos", store.live_videos(now)).await?;
        Ok(summarize(&videos, self.config.ttl_secs))
    }

    pub async fn clear_video_cache(&self, older_than_hours: u32) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };
        let cutoff = Utc::now().timestamp() - i64::from(older_than_hours) * 3600;

        match bounded(
            self.timeout,
            "delete_videos_created_before",
            store.delete_videos_created_before(cutoff),
        )
        .await
        {
            Ok(deleted) => {
                info!(
                    "Cleared {} video cache entries older than {} hours",
                    deleted, older_than_hours
                );
                deleted
            }
            Err(e) => {
                warn!("Error clearing video cache: {}", e);
                0
            }
        }
    }

    pub async fn purge_expired(&self) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };

        match bounded(
            self.timeout,
            "delete_expired_videos",
            store.delete_expired_videos(Utc::now().timestamp()),
        )
        .await
        {
            Ok(deleted) => {
                info!("Purged {} expired video cache entries", deleted);
                deleted
            }
            Err(e) => {
                warn!("Error purging expired video cache entries: {}", e);
                0
            }
        }
    }

    /// Case-insensitive search over title, channel and transcript text
    pub async fn search_videos(&self, text: &str) -> Vec<VideoSummary> {
        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };
        let now = Utc::now().timestamp();

        let videos = match bounded(self.timeout, "live_videos", store.live_videos(now)).await {
            Ok(videos) => videos,
            Err(e) => {
                warn!("Error searching videos: {}", e);
                return Vec::new();
            }
        };

        let needle = text.to_lowercase();
        videos
            .into_iter()
            .filter(|video| {
                video.metadata.title.to_lowercase().contains(&needle)
                    || video.metadata.channel.to_lowercase().contains(&needle)
                    || video.transcript_text().to_lowercase().contains(&needle)
            })
            .take(SEARCH_LIMIT)
            .map(|video| VideoSummary {
                created_at: timestamp_to_datetime(video.created_at),
                video_url: video.video_url,
                title: video.metadata.title,
                channel: video.metadata.channel,
                duration: video.metadata.duration,
            })
            .collect()
    }

    pub async fn close(&self) {
        if let Some(store) = &self.store {
            match store.close().await {
                Ok(()) => info!("Video cache connection closed"),
                Err(e) => warn!("Error closing video cache: {}", e),
            }
        }
    }
}

/// Aggregate statistics over a set of live videos
pub fn summarize(videos: &[VideoCacheEntry], ttl_seconds: u64) -> VideoStats {
    let total_duration: f64 = videos.iter().map(|v| v.metadata.duration).sum();

    let mut channels: HashMap<&str, usize> = HashMap::new();
    for video in videos {
        *channels.entry(video.metadata.channel.as_str()).or_insert(0) += 1;
    }
    let mut top_channels: Vec<ChannelCount> = channels
        .into_iter()
        .map(|(channel, count)| ChannelCount {
            channel: channel.to_string(),
            count,
        })
        .collect();
    top_channels.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.channel.cmp(&b.channel)));
    top_channels.truncate(TOP_CHANNELS);

    VideoStats {
        total_videos: videos.len(),
        total_transcript_length: videos.iter().map(|v| v.metadata.transcript_length).sum(),
        total_word_count: videos.iter().map(|v| v.metadata.word_count).sum(),
        avg_duration: if videos.is_empty() {
            0.0
        } else {
            total_duration / videos.len() as f64
        },
        oldest_entry: videos
            .iter()
            .map(|v| v.created_at)
            .min()
            .and_then(timestamp_to_datetime),
        newest_entry: videos
            .iter()
            .map(|v| v.created_at)
            .max()
            .and_then(timestamp_to_datetime),
        top_channels,
        ttl_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video(url: &str, channel: &str, duration: f64, created_at: i64) -> VideoCacheEntry {
        VideoCacheEntry::new(
            url,
            json!({"title": url, "channel": channel, "duration": duration}),
            json!({"text": "abcd", "word_count": 1}),
            json!({}),
            created_at,
            7200,
        )
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize(&[], 60);
        assert_eq!(stats.total_videos, 0);
        assert_eq!(stats.avg_duration, 0.0);
        assert!(stats.oldest_entry.is_none());
        assert!(stats.top_channels.is_empty());
        assert_eq!(stats.ttl_seconds, 60);
    }

    #[test]
    fn test_summarize_aggregates() {
        let videos: Vec<_> = [
            ("a", "CNBC", 100.0, 10),
            ("b", "CNBC", 200.0, 30),
            ("c", "Bloomberg", 300.0, 20),
            ("d", "Yahoo", 0.0, 40),
            ("e", "Reuters", 0.0, 50),
            ("f", "WSJ", 0.0, 60),
            ("g", "FT", 0.0, 70),
        ]
        .into_iter()
        .map(|(url, channel, duration, created_at)| video(url, channel, duration, created_at))
        .collect();

        let stats = summarize(&videos, 7200);
        assert_eq!(stats.total_videos, 7);
        assert_eq!(stats.total_transcript_length, 28);
        assert_eq!(stats.total_word_count, 7);
        assert!((stats.avg_duration - 600.0 / 7.0).abs() < 1e-9);
        assert_eq!(stats.oldest_entry.unwrap().timestamp(), 10);
        assert_eq!(stats.newest_entry.unwrap().timestamp(), 70);
        assert_eq!(stats.top_channels.len(), 5);
        assert_eq!(
            stats.top_channels[0],
            ChannelCount {
                channel: "CNBC".to_string(),
                count: 2
            }
        );
        // 同频次按名称排序
        assert_eq!(stats.top_channels[1].channel, "Bloomberg");
    }
}
