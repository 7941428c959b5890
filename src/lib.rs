//! Semantic query cache for financial analysis responses.
//!
//! Queries are reduced to typed entities (tickers, topics, locations, ...)
//! so that paraphrases of a cached question can be answered without calling
//! the expensive handlers again.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod presentation;
pub mod state;

pub use application::cache::{CacheLookup, QueryCache};
pub use application::video::VideoCache;
pub use domain::entities::{extract, EntityKind, EntitySet};
pub use domain::error::FinsightError;
pub use domain::key::{semantic_key, video_hash};
pub use domain::normalize::normalize;
pub use domain::response::ResponseEnvelope;
pub use domain::similarity::{similarity, SimilarityWeights};
pub use infrastructure::config::Config;
pub use state::AppState;
