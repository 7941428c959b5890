use crate::domain::entities::{extract, EntitySet};
use crate::domain::key::{semantic_key_from_parts, video_hash};
use crate::domain::normalize::normalize;
use crate::domain::response::ResponseEnvelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// 常用意图分类
pub mod intents {
    pub const PRICE_MOVEMENT: &str = "price_movement";
    pub const COMPANY_NEWS: &str = "company_news";
    pub const COMPANY_EVENT: &str = "company_event";
    pub const REGULATORY_NEWS: &str = "regulatory_news";
    pub const MARKET_SENTIMENT: &str = "market_sentiment";
    pub const NEWS_SUMMARY: &str = "news_summary";
    pub const TECHNICAL_ANALYSIS: &str = "technical_analysis";
    pub const FUNDAMENTAL_ANALYSIS: &str = "fundamental_analysis";
    pub const CRYPTO_SPECIFIC: &str = "crypto_specific";
    pub const VIDEO_TRANSCRIPTION: &str = "video_transcription";
    pub const GENERAL_QUERY: &str = "general_query";
}

/// `now - created_at >= ttl`, all in unix seconds.
pub fn is_expired(created_at: i64, cache_ttl: u64, now: i64) -> bool {
    let ttl = i64::try_from(cache_ttl).unwrap_or(i64::MAX);
    now.saturating_sub(created_at) >= ttl
}

pub fn timestamp_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

// 查询缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query_hash: String,
    pub original_query: String,
    pub normalized_query: String,
    pub intent: String,
    /// `None` for records written before entity extraction existed
    pub entities: Option<EntitySet>,
    pub response: ResponseEnvelope,
    pub created_at: i64, // unix 秒
    pub cache_ttl: u64,
}

impl CacheEntry {
    pub fn new(
        query: &str,
        intent: &str,
        response: ResponseEnvelope,
        created_at: i64,
        cache_ttl: u64,
    ) -> Self {
        let normalized_query = normalize(query);
        let entities = extract(query);
        Self {
            query_hash: semantic_key_from_parts(intent, &normalized_query, &entities),
            original_query: query.to_string(),
            normalized_query,
            intent: intent.to_string(),
            entities: Some(entities),
            response,
            created_at,
            cache_ttl,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        is_expired(self.created_at, self.cache_ttl, now)
    }
}

// 视频元数据 (用于统计)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
    pub duration: f64,
    pub view_count: u64,
    pub transcript_length: u64,
    pub word_count: u64,
}

impl VideoMetadata {
    pub fn derive(video_info: &Value, transcript: &Value) -> Self {
        let text_field = |value: &Value, key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string()
        };
        let count_field = |value: &Value, key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
                .unwrap_or(0)
        };

        Self {
            title: text_field(video_info, "title"),
            channel: text_field(video_info, "channel"),
            duration: video_info
                .get("duration")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            view_count: count_field(video_info, "view_count"),
            transcript_length: transcript
                .get("text")
                .and_then(Value::as_str)
                .map(|text| text.chars().count() as u64)
                .unwrap_or(0),
            word_count: count_field(transcript, "word_count"),
        }
    }
}

// 视频缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCacheEntry {
    pub video_hash: String,
    pub video_url: String,
    pub video_info: Value,
    pub transcript: Value,
    pub analysis: Value,
    pub metadata: VideoMetadata,
    pub created_at: i64,
    pub cache_ttl: u64,
}

impl VideoCacheEntry {
    pub fn new(
        video_url: &str,
        video_info: Value,
        transcript: Value,
        analysis: Value,
        created_at: i64,
        cache_ttl: u64,
    ) -> Self {
        Self {
            video_hash: video_hash(video_url),
            video_url: video_url.to_string(),
            metadata: VideoMetadata::derive(&video_info, &transcript),
            video_info,
            transcript,
            analysis,
            created_at,
            cache_ttl,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        is_expired(self.created_at, self.cache_ttl, now)
    }

    pub fn transcript_text(&self) -> &str {
        self.transcript
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// A video served from the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedVideo {
    pub video_info: Value,
    pub transcript: Value,
    pub analysis: Value,
    pub cached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub video_url: String,
    pub title: String,
    pub channel: String,
    pub duration: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub intent_distribution: BTreeMap<String, usize>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCount {
    pub channel: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStats {
    pub total_videos: usize,
    pub total_transcript_length: u64,
    pub total_word_count: u64,
    pub avg_duration: f64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub top_channels: Vec<ChannelCount>,
    pub ttl_seconds: u64,
}

// 响应来源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ResponseSource {
    ExactCache,
    SemanticCache { similarity: f64 },
    Fresh,
}
