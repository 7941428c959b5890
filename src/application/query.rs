use crate::application::cache::{CacheLookup, QueryCache};
use crate::application::video::VideoCache;
use crate::domain::model::{CachedVideo, ResponseSource};
use crate::domain::response::ResponseEnvelope;
use serde_json::Value;
use std::future::Future;

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub response: ResponseEnvelope,
    pub source: ResponseSource,
}

/// Answer a query from the cache, or compute and cache it.
///
/// `compute` runs only on a miss. Its errors pass through untouched; error
/// envelopes are returned but not cached.
pub async fn resolve_query<F, Fut, E>(
    cache: &QueryCache,
    query: &str,
    intent: &str,
    no_cache: bool,
    compute: F,
) -> Result<Resolved, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseEnvelope, E>>,
{
    // 1. Cache
    if !no_cache {
        match cache.lookup(query, intent).await {
            CacheLookup::Exact(response) => {
                return Ok(Resolved {
                    response,
                    source: ResponseSource::ExactCache,
                })
            }
            CacheLookup::Semantic {
                response,
                similarity,
                ..
            } => {
                return Ok(Resolved {
                    response,
                    source: ResponseSource::SemanticCache { similarity },
                })
            }
            CacheLookup::Miss => {}
        }
    }

    // 2. Fresh answer
    let response = compute().await?;

    // 3. Write back; only successful answers
    if !no_cache && response.is_cacheable() {
        cache.cache_response(query, intent, &response).await;
    }

    Ok(Resolved {
        response,
        source: ResponseSource::Fresh,
    })
}

/// Transcribed and analysed video data as produced by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct VideoData {
    pub video_info: Value,
    pub transcript: Value,
    pub analysis: Value,
}

/// Serve a video from the cache, or run the pipeline and cache its output
pub async fn resolve_video<F, Fut, E>(
    cache: &VideoCache,
    video_url: &str,
    compute: F,
) -> Result<(CachedVideo, ResponseSource), E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<VideoData, E>>,
{
    if let Some(cached) = cache.get_cached_video(video_url).await {
        return Ok((cached, ResponseSource::ExactCache));
    }

    let data = compute().await?;
    cache
        .cache_video_data(video_url, &data.video_info, &data.transcript, &data.analysis)
        .await;

    Ok((
        CachedVideo {
            video_info: data.video_info,
            transcript: data.transcript,
            analysis: data.analysis,
            cached_at: None,
        },
        ResponseSource::Fresh,
    ))
}
