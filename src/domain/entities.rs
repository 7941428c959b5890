//! Heuristic entity extraction for financial queries.
//!
//! Every content token is classified into exactly one [`EntityKind`]. Kinds
//! are tried in [`EntityKind::PRECEDENCE`] order and the first predicate that
//! accepts the token wins, so `US` is a ticker before it is a location.

use crate::domain::normalize::content_tokens;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.?\d*%?$").expect("number pattern is valid"));

// 公司名 -> 股票代码
const COMPANY_NAMES: &[(&str, &str)] = &[
    ("apple", "AAPL"),
    ("microsoft", "MSFT"),
    ("google", "GOOGL"),
    ("alphabet", "GOOGL"),
    ("amazon", "AMZN"),
    ("tesla", "TSLA"),
    ("meta", "META"),
    ("facebook", "META"),
    ("nvidia", "NVDA"),
    ("netflix", "NFLX"),
    ("intel", "INTC"),
    ("amd", "AMD"),
    ("ibm", "IBM"),
    ("oracle", "ORCL"),
    ("coinbase", "COIN"),
    ("paypal", "PYPL"),
    ("walmart", "WMT"),
    ("disney", "DIS"),
    ("boeing", "BA"),
    ("jpmorgan", "JPM"),
];

const TIME_PERIODS: &[&str] = &[
    "today", "yesterday", "tomorrow", "week", "month", "year", "quarter", "q1", "q2", "q3", "q4",
];

const LOCATIONS: &[&str] = &[
    "usa", "us", "america", "uk", "britain", "england", "europe", "eu", "china", "japan",
    "india", "pakistan", "germany", "france", "canada", "australia", "russia", "brazil",
    "korea", "singapore", "switzerland", "asia", "africa", "dubai",
];

const ACTIONS: &[&str] = &[
    "dropping", "drop", "dropped", "falling", "fall", "fell", "rising", "rise", "rose",
    "crash", "crashed", "crashing", "rally", "rallying", "surge", "surging", "plunge",
    "plunging", "soar", "soaring", "tumble", "tumbling", "decline", "declining", "gain",
    "gaining", "jump", "spike", "dip", "up", "down", "buy", "sell",
];

// 主题 -> 同义词
const TOPICS: &[(&str, &[&str])] = &[
    ("price", &["price", "prices", "cost", "value", "worth", "quote", "valuation"]),
    ("stock", &["stock", "stocks", "share", "shares", "equity", "equities"]),
    (
        "crypto",
        &["crypto", "cryptocurrency", "bitcoin", "btc", "ethereum", "eth", "blockchain", "exchange"],
    ),
    ("market", &["market", "markets", "exchange", "index", "nasdaq", "dow", "sp500"]),
    ("news", &["news", "headlines", "update", "updates", "announcement", "report"]),
    ("earnings", &["earnings", "revenue", "profit", "eps", "results", "income"]),
    ("regulation", &["regulation", "regulatory", "sec", "law", "policy", "ban", "compliance"]),
    ("weather", &["weather", "forecast", "temperature", "rain", "climate", "condition", "conditions"]),
    ("economy", &["economy", "inflation", "gdp", "interest", "rates", "fed", "recession"]),
    ("sentiment", &["sentiment", "outlook", "mood", "opinion"]),
];

/// The bucket a token is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Company,
    TimePeriod,
    Location,
    Number,
    Action,
    Topic,
    Keyword,
}

impl EntityKind {
    pub const PRECEDENCE: [EntityKind; 7] = [
        EntityKind::Company,
        EntityKind::TimePeriod,
        EntityKind::Location,
        EntityKind::Number,
        EntityKind::Action,
        EntityKind::Topic,
        EntityKind::Keyword,
    ];

    /// Whether this kind's predicate accepts the token on its own.
    pub fn matches(self, token: &str) -> bool {
        let lower = token.to_lowercase();
        match self {
            EntityKind::Company => is_ticker(token) || company_ticker(&lower).is_some(),
            EntityKind::TimePeriod => TIME_PERIODS.contains(&lower.as_str()),
            EntityKind::Location => LOCATIONS.contains(&lower.as_str()),
            EntityKind::Number => NUMBER.is_match(token),
            EntityKind::Action => ACTIONS.contains(&lower.as_str()),
            EntityKind::Topic => topics_for(&lower).next().is_some(),
            EntityKind::Keyword => true,
        }
    }

    pub fn classify(token: &str) -> EntityKind {
        Self::PRECEDENCE
            .into_iter()
            .find(|kind| kind.matches(token))
            .unwrap_or(EntityKind::Keyword)
    }
}

/// 1-5 uppercase ASCII letters, optionally prefixed with `$`.
fn is_ticker(token: &str) -> bool {
    let symbol = token.strip_prefix('$').unwrap_or(token);
    (1..=5).contains(&symbol.len()) && symbol.chars().all(|c| c.is_ascii_uppercase())
}

fn company_ticker(lower: &str) -> Option<&'static str> {
    COMPANY_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, ticker)| *ticker)
}

fn topics_for(lower: &str) -> impl Iterator<Item = &'static str> + '_ {
    TOPICS
        .iter()
        .filter(move |(topic, synonyms)| *topic == lower || synonyms.contains(&lower))
        .map(|(topic, _)| *topic)
}

/// Typed token buckets extracted from one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySet {
    pub companies: BTreeSet<String>,
    pub topics: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub time_periods: BTreeSet<String>,
    pub actions: BTreeSet<String>,
    pub numbers: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
}

impl EntitySet {
    pub fn bucket(&self, kind: EntityKind) -> &BTreeSet<String> {
        match kind {
            EntityKind::Company => &self.companies,
            EntityKind::TimePeriod => &self.time_periods,
            EntityKind::Location => &self.locations,
            EntityKind::Number => &self.numbers,
            EntityKind::Action => &self.actions,
            EntityKind::Topic => &self.topics,
            EntityKind::Keyword => &self.keywords,
        }
    }

    /// Add a token to the bucket of `kind`, case-normalizing it.
    ///
    /// Company names are stored as their ticker, a topic synonym is stored
    /// as every topic it belongs to.
    pub fn insert(&mut self, kind: EntityKind, token: &str) {
        let lower = token.to_lowercase();
        match kind {
            EntityKind::Company => {
                let symbol = match company_ticker(&lower) {
                    Some(ticker) => ticker.to_string(),
                    None => token.trim_start_matches('$').to_uppercase(),
                };
                self.companies.insert(symbol);
            }
            EntityKind::Topic => self.topics.extend(topics_for(&lower).map(str::to_string)),
            EntityKind::TimePeriod => {
                self.time_periods.insert(lower);
            }
            EntityKind::Location => {
                self.locations.insert(lower);
            }
            EntityKind::Number => {
                self.numbers.insert(lower);
            }
            EntityKind::Action => {
                self.actions.insert(lower);
            }
            EntityKind::Keyword => {
                self.keywords.insert(lower);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::PRECEDENCE
            .into_iter()
            .all(|kind| self.bucket(kind).is_empty())
    }
}

pub fn extract(text: &str) -> EntitySet {
    let mut entities = EntitySet::default();
    for token in content_tokens(text) {
        entities.insert(EntityKind::classify(&token), &token);
    }
    entities
}
