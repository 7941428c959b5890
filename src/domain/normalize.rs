// Query text normalization shared by entity extraction and key generation
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Everything except word characters, whitespace, `$` and `%`.
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s$%]").expect("punctuation pattern is valid"));

const STOP_WORDS: &[&str] = &[
    // articles
    "a", "an", "the",
    // auxiliaries
    "is", "are", "was", "were", "be", "been", "being", "am", "do", "does", "did", "have", "has",
    "had", "will", "would", "can", "could", "should", "may", "might",
    // question words
    "what", "whats", "when", "where", "which", "who", "whom", "why", "how",
    // pronouns
    "i", "me", "my", "you", "your", "it", "its", "this", "that", "these", "those", "we", "our",
    // fillers and prepositions
    "of", "in", "on", "at", "to", "for", "with", "about", "and", "or", "tell", "please", "much",
    "any", "some",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORD_SET.contains(token.to_lowercase().as_str())
}

/// Split text into content tokens, keeping the caller's letter case.
///
/// Punctuation is stripped (except `$`/`%`), whitespace runs collapse and
/// stop words are dropped case-insensitively.
pub fn content_tokens(text: &str) -> Vec<String> {
    PUNCTUATION
        .replace_all(text.trim(), "")
        .split_whitespace()
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// Canonical lower-case form of a query.
pub fn normalize(text: &str) -> String {
    content_tokens(&text.trim().to_lowercase()).join(" ")
}
