// Content hashes used as primary keys of the caches
use crate::domain::entities::{extract, EntitySet};
use crate::domain::normalize::normalize;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Exact-match key for a query within an intent.
pub fn semantic_key(query: &str, intent: &str) -> String {
    semantic_key_from_parts(intent, &normalize(query), &extract(query))
}

/// Key from already computed parts, so callers that need the entities do not
/// extract twice.
///
/// Only companies, topics and locations take part: actions, time periods,
/// numbers and keywords are too noisy for identity.
pub fn semantic_key_from_parts(intent: &str, normalized: &str, entities: &EntitySet) -> String {
    // JSON array keeps component boundaries unambiguous; sets serialize sorted
    let components = json!([
        intent,
        normalized,
        entities.companies,
        entities.topics,
        entities.locations,
    ]);
    digest(&components.to_string())
}

/// Identity key for a video; the URL is hashed verbatim.
pub fn video_hash(video_url: &str) -> String {
    digest(video_url)
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}
