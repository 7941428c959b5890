//! Weighted Jaccard similarity between two entity sets.
//!
//! Each bucket where at least one side has values contributes
//! `jaccard * weight` to the score and `weight` to the maximum. Identical
//! non-empty company or topic sets earn a bonus on both sides of the ratio.

use crate::domain::entities::{EntityKind, EntitySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Per-bucket weights and exact-match bonuses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub companies: f64,
    pub topics: f64,
    pub actions: f64,
    pub locations: f64,
    pub time_periods: f64,
    pub keywords: f64,
    pub numbers: f64,
    pub company_match_bonus: f64,
    pub topic_match_bonus: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            companies: 0.40,
            topics: 0.30,
            actions: 0.20,
            locations: 0.10,
            time_periods: 0.10,
            keywords: 0.05,
            numbers: 0.05,
            company_match_bonus: 0.10,
            topic_match_bonus: 0.05,
        }
    }
}

impl SimilarityWeights {
    pub fn weight(&self, kind: EntityKind) -> f64 {
        match kind {
            EntityKind::Company => self.companies,
            EntityKind::Topic => self.topics,
            EntityKind::Action => self.actions,
            EntityKind::Location => self.locations,
            EntityKind::TimePeriod => self.time_periods,
            EntityKind::Keyword => self.keywords,
            EntityKind::Number => self.numbers,
        }
    }
}

/// `|A ∩ B| / |A ∪ B|`, 0 for two empty sets.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

pub fn similarity(a: &EntitySet, b: &EntitySet) -> f64 {
    similarity_with(a, b, &SimilarityWeights::default())
}

pub fn similarity_with(a: &EntitySet, b: &EntitySet, weights: &SimilarityWeights) -> f64 {
    let mut score = 0.0;
    let mut max_score = 0.0;

    for kind in EntityKind::PRECEDENCE {
        let (left, right) = (a.bucket(kind), b.bucket(kind));
        if left.is_empty() && right.is_empty() {
            continue;
        }
        let weight = weights.weight(kind);
        score += jaccard(left, right) * weight;
        max_score += weight;
    }

    if !a.companies.is_empty() && a.companies == b.companies {
        score += weights.company_match_bonus;
        max_score += weights.company_match_bonus;
    }
    if !a.topics.is_empty() && a.topics == b.topics {
        score += weights.topic_match_bonus;
        max_score += weights.topic_match_bonus;
    }

    if max_score <= 0.0 {
        return 0.0;
    }
    (score / max_score).clamp(0.0, 1.0)
}
