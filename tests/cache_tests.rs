//! 查询缓存功能测试

use finsight_cache::domain::model::{intents, CacheEntry};
use finsight_cache::domain::traits::CacheStore;
use finsight_cache::infrastructure::config::CacheConfig;
use finsight_cache::infrastructure::storage::cache::MemoryStore;
use finsight_cache::infrastructure::storage::db::SqliteStore;
use finsight_cache::{semantic_key, CacheLookup, FinsightError, QueryCache, ResponseEnvelope};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn memory_cache(config: CacheConfig) -> (Arc<MemoryStore>, QueryCache) {
    let store = Arc::new(MemoryStore::new());
    let cache = QueryCache::new(store.clone(), config, TIMEOUT);
    (store, cache)
}

async fn sqlite_cache(config: CacheConfig) -> (Arc<SqliteStore>, QueryCache) {
    let store = Arc::new(
        SqliteStore::open_in_memory("query_cache", "video_cache")
            .await
            .unwrap(),
    );
    let cache = QueryCache::new(store.clone(), config, TIMEOUT);
    (store, cache)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
async fn test_exact_round_trip() {
    let (_, cache) = memory_cache(CacheConfig::default());
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL is up 2%")
        .with_market_data(json!({"symbols_found": ["AAPL"]}));

    assert!(
        cache
            .cache_response("What is the price of AAPL stock?", intents::PRICE_MOVEMENT, &response)
            .await
    );

    // 标点与停用词不影响精确匹配
    let lookup = cache
        .lookup("what is the price of AAPL stock", intents::PRICE_MOVEMENT)
        .await;
    assert_eq!(lookup, CacheLookup::Exact(response));
}

#[tokio::test]
async fn test_semantic_hit_is_annotated() {
    let (_, cache) = memory_cache(CacheConfig::default());
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL is up 2%");
    cache
        .cache_response("what is the price of AAPL stock", intents::PRICE_MOVEMENT, &response)
        .await;

    match cache
        .lookup("AAPL stock price today", intents::PRICE_MOVEMENT)
        .await
    {
        CacheLookup::Semantic {
            response,
            similarity,
            matched_query,
        } => {
            assert!((similarity - 0.85 / 0.95).abs() < 1e-9);
            assert_eq!(matched_query, "what is the price of AAPL stock");
            assert_eq!(response.cached(), Some(true));
            assert_eq!(response.cache_similarity(), Some(similarity));
            assert_eq!(
                response.original_query(),
                Some("what is the price of AAPL stock")
            );
            assert_eq!(response.body().unwrap().text(), "AAPL is up 2%");
        }
        other => panic!("expected semantic hit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_intents_are_partitioned() {
    let (_, cache) = memory_cache(CacheConfig::default());
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL is up 2%");
    cache
        .cache_response("AAPL stock price", intents::PRICE_MOVEMENT, &response)
        .await;

    assert_eq!(
        cache.lookup("AAPL stock price", intents::COMPANY_NEWS).await,
        CacheLookup::Miss
    );
    assert!(cache
        .get_cached_response("AAPL stock price", intents::PRICE_MOVEMENT)
        .await
        .is_some());
}

#[tokio::test]
async fn test_unrelated_query_misses() {
    let (_, cache) = memory_cache(CacheConfig::default());
    cache
        .cache_response(
            "TSLA stock",
            intents::PRICE_MOVEMENT,
            &ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "TSLA"),
        )
        .await;

    assert_eq!(
        cache.lookup("NVDA stock", intents::PRICE_MOVEMENT).await,
        CacheLookup::Miss
    );
}

#[tokio::test]
async fn test_expired_entry_is_deleted_on_read() {
    let (store, cache) = memory_cache(CacheConfig::default());
    let entry = CacheEntry::new(
        "AAPL stock price",
        intents::PRICE_MOVEMENT,
        ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "old"),
        now() - 7200 - 1,
        7200,
    );
    store.upsert_entry(&entry).await.unwrap();

    assert_eq!(
        cache.lookup("AAPL stock price", intents::PRICE_MOVEMENT).await,
        CacheLookup::Miss
    );
    assert!(store.find_entry(&entry.query_hash).await.unwrap().is_none());
}

#[tokio::test]
async fn test_error_response_is_not_cached() {
    let (store, cache) = memory_cache(CacheConfig::default());
    let failure = ResponseEnvelope::failure(intents::PRICE_MOVEMENT, "upstream timeout");

    assert!(
        !cache
            .cache_response("AAPL stock price", intents::PRICE_MOVEMENT, &failure)
            .await
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_write_overwrites_same_key() {
    let (store, cache) = memory_cache(CacheConfig::default());
    for text in ["first", "second"] {
        cache
            .cache_response(
                "AAPL stock price",
                intents::PRICE_MOVEMENT,
                &ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, text),
            )
            .await;
    }

    assert_eq!(store.len(), 1);
    let response = cache
        .get_cached_response("AAPL stock price", intents::PRICE_MOVEMENT)
        .await
        .unwrap();
    assert_eq!(response.body().unwrap().text(), "second");
}

#[tokio::test]
async fn test_stats_count_live_entries_only() {
    let (store, cache) = memory_cache(CacheConfig::default());
    for query in ["AAPL stock", "TSLA stock", "bitcoin news"] {
        cache
            .cache_response(
                query,
                intents::MARKET_SENTIMENT,
                &ResponseEnvelope::answer(intents::MARKET_SENTIMENT, query),
            )
            .await;
    }
    cache
        .cache_response(
            "fed rates",
            intents::NEWS_SUMMARY,
            &ResponseEnvelope::answer(intents::NEWS_SUMMARY, "rates"),
        )
        .await;
    let expired = CacheEntry::new(
        "NVDA earnings",
        intents::NEWS_SUMMARY,
        ResponseEnvelope::answer(intents::NEWS_SUMMARY, "old"),
        now() - 10_000,
        7200,
    );
    store.upsert_entry(&expired).await.unwrap();

    let stats = cache.get_cache_stats().await.unwrap();
    assert_eq!(stats.total_entries, 4);
    assert_eq!(stats.intent_distribution[intents::MARKET_SENTIMENT], 3);
    assert_eq!(stats.intent_distribution[intents::NEWS_SUMMARY], 1);
    assert_eq!(stats.ttl_seconds, 7200);
    assert!(stats.oldest_entry.is_some());
    assert!(stats.oldest_entry <= stats.newest_entry);
}

#[tokio::test]
async fn test_stats_on_empty_cache() {
    let (_, cache) = memory_cache(CacheConfig::default());
    let stats = cache.get_cache_stats().await.unwrap();
    assert_eq!(stats.total_entries, 0);
    assert!(stats.intent_distribution.is_empty());
    assert!(stats.oldest_entry.is_none());
    assert!(stats.newest_entry.is_none());
}

#[tokio::test]
async fn test_clear_and_purge() {
    let (store, cache) = memory_cache(CacheConfig::default());
    let old = CacheEntry::new(
        "TSLA stock",
        intents::PRICE_MOVEMENT,
        ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "old"),
        now() - 3 * 3600,
        7200,
    );
    let recent = CacheEntry::new(
        "AAPL stock",
        intents::PRICE_MOVEMENT,
        ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "new"),
        now(),
        7200,
    );
    store.upsert_entry(&old).await.unwrap();
    store.upsert_entry(&recent).await.unwrap();

    assert_eq!(cache.purge_expired().await, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(cache.clear_cache(1).await, 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_clear_cache_removes_old_entries() {
    let (store, cache) = memory_cache(CacheConfig::default());
    let old = CacheEntry::new(
        "TSLA stock",
        intents::PRICE_MOVEMENT,
        ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "old"),
        now() - 2 * 3600,
        86_400,
    );
    store.upsert_entry(&old).await.unwrap();

    assert_eq!(cache.clear_cache(24).await, 0);
    assert_eq!(cache.clear_cache(1).await, 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_disabled_cache_bypasses_store() {
    let (store, cache) = memory_cache(CacheConfig::default().with_enabled(false));
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL");

    assert!(
        !cache
            .cache_response("AAPL stock", intents::PRICE_MOVEMENT, &response)
            .await
    );
    assert!(store.is_empty());
    assert_eq!(
        cache.lookup("AAPL stock", intents::PRICE_MOVEMENT).await,
        CacheLookup::Miss
    );
    // 管理操作仍然可用
    assert_eq!(cache.get_cache_stats().await.unwrap().total_entries, 0);
}

#[tokio::test]
async fn test_unavailable_cache_degrades() {
    let cache = QueryCache::unavailable(CacheConfig::default());
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL");

    assert!(!cache.is_available());
    assert_eq!(
        cache.lookup("AAPL stock", intents::PRICE_MOVEMENT).await,
        CacheLookup::Miss
    );
    assert!(
        !cache
            .cache_response("AAPL stock", intents::PRICE_MOVEMENT, &response)
            .await
    );
    assert!(matches!(
        cache.get_cache_stats().await,
        Err(FinsightError::Unavailable)
    ));
    assert_eq!(cache.clear_cache(24).await, 0);
    assert_eq!(cache.purge_expired().await, 0);
    cache.close().await;
}

#[tokio::test]
async fn test_threshold_is_configurable() {
    let (_, cache) = memory_cache(CacheConfig::default().with_similarity_threshold(0.95));
    cache
        .cache_response(
            "what is the price of AAPL stock",
            intents::PRICE_MOVEMENT,
            &ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL"),
        )
        .await;

    assert_eq!(
        cache
            .lookup("AAPL stock price today", intents::PRICE_MOVEMENT)
            .await,
        CacheLookup::Miss
    );
}

#[tokio::test]
async fn test_sqlite_semantic_round_trip() {
    let (store, cache) = sqlite_cache(CacheConfig::default()).await;
    let response = ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL is up 2%")
        .with_market_data(json!({"news_count": 3}));
    cache
        .cache_response("what is the price of AAPL stock", intents::PRICE_MOVEMENT, &response)
        .await;

    let key = semantic_key("what is the price of AAPL stock", intents::PRICE_MOVEMENT);
    let stored = store.find_entry(&key).await.unwrap().unwrap();
    assert_eq!(stored.response, response);
    assert!(stored.entities.unwrap().companies.contains("AAPL"));

    let lookup = cache
        .lookup("AAPL stock price today", intents::PRICE_MOVEMENT)
        .await;
    assert!(matches!(lookup, CacheLookup::Semantic { .. }));
    cache.close().await;
}

#[tokio::test]
async fn test_entry_without_entities_is_skipped() {
    let (store, cache) = sqlite_cache(CacheConfig::default()).await;
    let mut legacy = CacheEntry::new(
        "what is the price of AAPL stock",
        intents::PRICE_MOVEMENT,
        ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "legacy"),
        now(),
        7200,
    );
    legacy.entities = None;
    store.upsert_entry(&legacy).await.unwrap();

    // 精确匹配仍然命中
    assert!(matches!(
        cache
            .lookup("what is the price of AAPL stock", intents::PRICE_MOVEMENT)
            .await,
        CacheLookup::Exact(_)
    ));
    assert_eq!(
        cache
            .lookup("AAPL stock price today", intents::PRICE_MOVEMENT)
            .await,
        CacheLookup::Miss
    );
}

#[tokio::test]
async fn test_sqlite_stats_and_purge() {
    let (store, cache) = sqlite_cache(CacheConfig::default()).await;
    cache
        .cache_response(
            "AAPL stock",
            intents::PRICE_MOVEMENT,
            &ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "AAPL"),
        )
        .await;
    let expired = CacheEntry::new(
        "TSLA stock",
        intents::PRICE_MOVEMENT,
        ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, "TSLA"),
        now() - 7200,
        7200,
    );
    store.upsert_entry(&expired).await.unwrap();

    assert_eq!(cache.get_cache_stats().await.unwrap().total_entries, 1);
    assert_eq!(cache.purge_expired().await, 1);
    assert!(store.find_entry(&expired.query_hash).await.unwrap().is_none());
}

#[tokio::test]
async fn test_opaque_payloads_returned_verbatim() {
    let (memory_store, memory) = memory_cache(CacheConfig::default());
    let (_, sqlite) = sqlite_cache(CacheConfig::default()).await;
    let raw = json!({
        "intent": null,
        "analysis": {"summary": "AAPL up", "score": 0.7},
        "market_data": null,
        "sources": ["reuters", null]
    });
    let response = ResponseEnvelope::from_value(raw.clone()).unwrap();

    for cache in [&memory, &sqlite] {
        assert!(
            cache
                .cache_response("AAPL stock price", intents::PRICE_MOVEMENT, &response)
                .await
        );
        let cached = cache
            .get_cached_response("AAPL stock price", intents::PRICE_MOVEMENT)
            .await
            .unwrap();
        assert_eq!(cached.into_value(), raw);
    }

    // "error": null 仍视为错误响应
    let failed = ResponseEnvelope::from_value(json!({"analysis": "x", "error": null})).unwrap();
    assert!(
        !memory
            .cache_response("TSLA stock", intents::PRICE_MOVEMENT, &failed)
            .await
    );
    assert_eq!(memory_store.len(), 1);
}

async fn assert_latest_write_wins_ties(store: Arc<dyn CacheStore>) {
    let cache = QueryCache::new(store.clone(), CacheConfig::default(), TIMEOUT);
    let created_at = now();
    let queries = ["AAPL price today", "AAPL price week", "AAPL price month", "AAPL price year"];
    for query in queries {
        let entry = CacheEntry::new(
            query,
            intents::PRICE_MOVEMENT,
            ResponseEnvelope::analysis(intents::PRICE_MOVEMENT, query),
            created_at,
            7200,
        );
        store.upsert_entry(&entry).await.unwrap();
    }

    match cache.lookup("AAPL price", intents::PRICE_MOVEMENT).await {
        CacheLookup::Semantic { matched_query, .. } => assert_eq!(matched_query, "AAPL price year"),
        other => panic!("expected semantic hit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_equal_scores_prefer_latest_write() {
    assert_latest_write_wins_ties(Arc::new(MemoryStore::new())).await;
    let (sqlite, _) = sqlite_cache(CacheConfig::default()).await;
    assert_latest_write_wins_ties(sqlite).await;
}
