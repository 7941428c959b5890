//! Response payloads stored by the query cache.
//!
//! Handlers return loosely shaped JSON objects. The envelope keeps the object
//! exactly as given (non-string bodies and explicit `null`s included) and
//! reads the fields the cache cares about through accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

const INTENT: &str = "intent";
const ANALYSIS: &str = "analysis";
const RESPONSE: &str = "response";
const MESSAGE: &str = "message";
const MARKET_DATA: &str = "market_data";
const ERROR: &str = "error";
// 语义命中时由缓存添加
const CACHED: &str = "cached";
const CACHE_SIMILARITY: &str = "cache_similarity";
const ORIGINAL_QUERY: &str = "original_query";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseEnvelope {
    fields: Map<String, Value>,
}

/// The main field of a response, whichever key carries it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseBody<'a> {
    Analysis(&'a Value),
    Response(&'a Value),
    Message(&'a Value),
}

impl<'a> ResponseBody<'a> {
    pub fn value(&self) -> &'a Value {
        match *self {
            ResponseBody::Analysis(value)
            | ResponseBody::Response(value)
            | ResponseBody::Message(value) => value,
        }
    }

    /// Strings as-is, anything else as compact JSON
    pub fn text(&self) -> Cow<'a, str> {
        match self.value() {
            Value::String(text) => Cow::Borrowed(text.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }
}

impl ResponseEnvelope {
    fn with_field(intent: String, key: &str, value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert(INTENT.to_string(), Value::String(intent));
        fields.insert(key.to_string(), value);
        Self { fields }
    }

    pub fn analysis(intent: impl Into<String>, analysis: impl Into<String>) -> Self {
        Self::with_field(intent.into(), ANALYSIS, Value::String(analysis.into()))
    }

    pub fn answer(intent: impl Into<String>, response: impl Into<String>) -> Self {
        Self::with_field(intent.into(), RESPONSE, Value::String(response.into()))
    }

    pub fn failure(intent: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_field(intent.into(), ERROR, Value::String(error.into()))
    }

    pub fn with_market_data(self, market_data: Value) -> Self {
        self.with(MARKET_DATA, market_data)
    }

    /// Set an arbitrary key, replacing any previous value
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn intent(&self) -> Option<&str> {
        self.str_field(INTENT)
    }

    pub fn market_data(&self) -> Option<&Value> {
        self.present(MARKET_DATA)
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn body(&self) -> Option<ResponseBody<'_>> {
        if let Some(value) = self.present(ANALYSIS) {
            return Some(ResponseBody::Analysis(value));
        }
        if let Some(value) = self.present(RESPONSE) {
            return Some(ResponseBody::Response(value));
        }
        self.present(MESSAGE).map(ResponseBody::Message)
    }

    /// Any `error` key marks a failure, even `"error": null`.
    pub fn is_error(&self) -> bool {
        self.fields.contains_key(ERROR)
    }

    /// Failure payloads are never written to the cache.
    pub fn is_cacheable(&self) -> bool {
        !self.is_error()
    }

    pub fn cached(&self) -> Option<bool> {
        self.fields.get(CACHED).and_then(Value::as_bool)
    }

    pub fn cache_similarity(&self) -> Option<f64> {
        self.fields.get(CACHE_SIMILARITY).and_then(Value::as_f64)
    }

    pub fn original_query(&self) -> Option<&str> {
        self.str_field(ORIGINAL_QUERY)
    }

    /// Mark a response served from a similar, not identical, query.
    pub fn annotated(self, similarity: f64, original_query: &str) -> Self {
        self.with(CACHED, Value::Bool(true))
            .with(CACHE_SIMILARITY, Value::from(similarity))
            .with(ORIGINAL_QUERY, Value::String(original_query.to_string()))
    }

    /// Only JSON objects are accepted
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
