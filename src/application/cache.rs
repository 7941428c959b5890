//! Query cache manager.
//!
//! A lookup ends in one of three states: an exact hit on the semantic key,
//! a semantic hit on the most similar live entry of the same intent, or a
//! miss. Store failures never reach the caller; they are logged and the
//! cache behaves as if it were empty.

use crate::application::{bounded, preview};
use crate::domain::entities::{extract, EntitySet};
use crate::domain::error::FinsightError;
use crate::domain::key::semantic_key_from_parts;
use crate::domain::model::{timestamp_to_datetime, CacheEntry, CacheStats};
use crate::domain::normalize::normalize;
use crate::domain::response::ResponseEnvelope;
use crate::domain::similarity::{similarity_with, SimilarityWeights};
use crate::domain::traits::CacheStore;
use crate::infrastructure::config::CacheConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Exact(ResponseEnvelope),
    Semantic {
        response: ResponseEnvelope,
        similarity: f64,
        matched_query: String,
    },
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheLookup::Miss)
    }

    pub fn into_response(self) -> Option<ResponseEnvelope> {
        match self {
            CacheLookup::Exact(response) | CacheLookup::Semantic { response, .. } => Some(response),
            CacheLookup::Miss => None,
        }
    }
}

/// Highest-scoring candidate; earlier candidates win ties.
///
/// Candidates without entities never match.
pub fn best_match<'a>(
    entities: &EntitySet,
    candidates: &'a [CacheEntry],
    weights: &SimilarityWeights,
) -> Option<(&'a CacheEntry, f64)> {
    let mut best: Option<(&CacheEntry, f64)> = None;
    for candidate in candidates {
        let Some(candidate_entities) = &candidate.entities else {
            debug!("Skipping cache entry {} without entities", candidate.query_hash);
            continue;
        };
        let score = similarity_with(entities, candidate_entities, weights);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best
}

pub struct QueryCache {
    store: Option<Arc<dyn CacheStore>>,
    config: CacheConfig,
    timeout: Duration,
}

impl QueryCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig, timeout: Duration) -> Self {
        Self {
            store: Some(store),
            config,
            timeout,
        }
    }

    /// A cache whose backend could not be reached; every lookup misses
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

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn active_store(&self) -> Option<&Arc<dyn CacheStore>> {
        if !self.config.enabled {
            return None;
        }
        self.store.as_ref()
    }

    pub async fn get_cached_response(&self, query: &str, intent: &str) -> Option<ResponseEnvelope> {
        self.lookup(query, intent).await.into_response()
    }

    pub async fn lookup(&self, query: &str, intent: &str) -> CacheLookup {
        let Some(store) = self.active_store() else {
            return CacheLookup::Miss;
        };

        match self.try_lookup(store, query, intent).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!("Error retrieving cached response: {}", e);
                CacheLookup::Miss
            }
        }
    }

    async fn try_lookup(
        &self,
        store: &Arc<dyn CacheStore>,
        query: &str,
        intent: &str,
    ) -> Result<CacheLookup, FinsightError> {
        let normalized = normalize(query);
        let entities = extract(query);
        let query_hash = semantic_key_from_parts(intent, &normalized, &entities);
        let now = Utc::now().timestamp();

        match bounded(self.timeout, "find_entry", store.find_entry(&query_hash)).await {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                info!("Cache hit for query: {}", preview(query));
                return Ok(CacheLookup::Exact(entry.response));
            }
            Ok(Some(_)) => {
                bounded(self.timeout, "delete_entry", store.delete_entry(&query_hash)).await?;
                info!("Expired cache removed for query: {}", preview(query));
            }
            Ok(None) => {}
            // 精确匹配失败时仍然尝试语义匹配
            Err(e) => warn!("Unreadable exact cache entry {}: {}", query_hash, e),
        }

        let candidates = bounded(
            self.timeout,
            "live_entries_for_intent",
            store.live_entries_for_intent(intent, now),
        )
        .await?;

        if let Some((entry, score)) = best_match(&entities, &candidates, &self.config.weights) {
            if score >= self.config.similarity_threshold {
                info!(
                    "Semantic cache hit ({:.2}) for query: {} -> {}",
                    score,
                    preview(query),
                    preview(&entry.original_query)
                );
                return Ok(CacheLookup::Semantic {
                    response: entry
                        .response
                        .clone()
                        .annotated(score, &entry.original_query),
                    similarity: score,
                    matched_query: entry.original_query.clone(),
                });
            }
            debug!("Best semantic candidate scored {:.2}, below threshold", score);
        }

        info!("Cache miss for query: {}", preview(query));
        Ok(CacheLookup::Miss)
    }

    /// Store a fresh response; `false` when disabled, rejected or failed
    pub async fn cache_response(&self, query: &str, intent: &str, response: &ResponseEnvelope) -> bool {
        let Some(store) = self.active_store() else {
            return false;
        };
        if !response.is_cacheable() {
            debug!("Not caching error response for query: {}", preview(query));
            return false;
        }

        let entry = CacheEntry::new(
            query,
            intent,
            response.clone(),
            Utc::now().timestamp(),
            self.config.ttl_secs,
        );

        match bounded(self.timeout, "upsert_entry", store.upsert_entry(&entry)).await {
            Ok(()) => {
                info!("Cached response for query: {}", preview(query));
                true
            }
            Err(e) => {
                warn!("Error caching response: {}", e);
                false
            }
        }
    }

    /// Live entries only; `Unavailable` when there is no backend
    pub async fn get_cache_stats(&self) -> Result<CacheStats, FinsightError> {
        let store = self.store.as_ref().ok_or(FinsightError::Unavailable)?;
        let now = Utc::now().timestamp();

        let total_entries = bounded(self.timeout, "count_live", store.count_live(now)).await?;
        let intent_distribution =
            bounded(self.timeout, "intent_distribution", store.intent_distribution(now)).await?;
        let range = bounded(self.timeout, "created_range", store.created_range(now)).await?;

        Ok(CacheStats {
            total_entries,
            intent_distribution,
            oldest_entry: range.and_then(|(oldest, _)| timestamp_to_datetime(oldest)),
            newest_entry: range.and_then(|(_, newest)| timestamp_to_datetime(newest)),
            ttl_seconds: self.config.ttl_secs,
        })
    }

    /// Delete entries created more than `older_than_hours` ago
    pub async fn clear_cache(&self, older_than_hours: u32) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };
        let cutoff = Utc::now().timestamp() - i64::from(older_than_hours) * 3600;

        match bounded(self.timeout, "delete_created_before", store.delete_created_before(cutoff)).await {
            Ok(deleted) => {
                info!(
                    "Cleared {} cache entries older than {} hours",
                    deleted, older_than_hours
                );
                deleted
            }
            Err(e) => {
                warn!("Error clearing cache: {}", e);
                0
            }
        }
    }

    /// Delete every entry past its own TTL
    pub async fn purge_expired(&self) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };

        match bounded(self.timeout, "delete_expired", store.delete_expired(Utc::now().timestamp())).await {
            Ok(deleted) => {
                info!("Purged {} expired cache entries", deleted);
                deleted
            }
            Err(e) => {
                warn!("Error purging expired cache entries: {}", e);
                0
            }
        }
    }

    pub async fn close(&self) {
        if let Some(store) = &self.store {
            match store.close().await {
                Ok(()) => info!("Query cache connection closed"),
                Err(e) => warn!("Error closing query cache: {}", e),
            }
        }
    }
}
