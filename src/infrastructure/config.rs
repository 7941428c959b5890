use crate::domain::error::FinsightError;
use crate::domain::similarity::{SimilarityWeights, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Logging {
    #[serde(default = "default_enable")]
    pub enable: bool,
    pub path: Option<String>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Query and video cache behaviour
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_enable")]
    pub enabled: bool,
    /// Entry lifetime in seconds, copied into every entry at write time
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Minimum similarity for a semantic hit (0.0 to 1.0)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub weights: SimilarityWeights,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory holding the database file; config directory when unset
    pub path: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_query_table")]
    pub query_table: String,
    #[serde(default = "default_video_table")]
    pub video_table: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            enable: true,
            path: None,
            level: "WARN".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            similarity_threshold: default_similarity_threshold(),
            weights: SimilarityWeights::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_weights(mut self, weights: SimilarityWeights) -> Self {
        self.weights = weights;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            database: default_database(),
            query_table: default_query_table(),
            video_table: default_video_table(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// Defaults
fn default_enable() -> bool {
    true
}
fn default_log_level() -> String {
    "WARN".to_string()
}
fn default_ttl_secs() -> u64 {
    7200 // 2 小时
}
fn default_similarity_threshold() -> f64 {
    DEFAULT_THRESHOLD
}
fn default_database() -> String {
    "finsight".to_string()
}
fn default_query_table() -> String {
    "query_cache".to_string()
}
fn default_video_table() -> String {
    "video_cache".to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Config {
    /// Reject values the store or the scorer cannot work with
    pub fn validate(&self) -> Result<(), FinsightError> {
        for (field, name) in [
            ("store.query_table", &self.store.query_table),
            ("store.video_table", &self.store.video_table),
        ] {
            if !is_identifier(name) {
                return Err(FinsightError::Config(format!(
                    "{} must be a plain identifier, got {:?}",
                    field, name
                )));
            }
        }
        if self.store.query_table == self.store.video_table {
            return Err(FinsightError::Config(
                "store.query_table and store.video_table must differ".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(FinsightError::Config(format!(
                "cache.similarity_threshold must be within 0..=1, got {}",
                self.cache.similarity_threshold
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(FinsightError::Config(
                "store.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `CACHE_TTL` and `CACHE_ENABLED` overrides
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ttl) = lookup("CACHE_TTL") {
            match ttl.trim().parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => eprintln!("Warning: Ignoring invalid CACHE_TTL {:?}", ttl),
            }
        }
        if let Some(enabled) = lookup("CACHE_ENABLED") {
            match enabled.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.cache.enabled = true,
                "0" | "false" | "no" | "off" => self.cache.enabled = false,
                _ => eprintln!("Warning: Ignoring invalid CACHE_ENABLED {:?}", enabled),
            }
        }
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("finsight").join("config.toml"))
}

/// Get database path (uses config directory by default)
pub fn get_database_path(config: &Config) -> PathBuf {
    let dir = match &config.store.path {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finsight"),
    };
    dir.join(format!("{}.db", config.store.database))
}

pub fn parse_config(content: &str) -> Result<Config, FinsightError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Result<Config, FinsightError> {
    let mut config = Config::default();

    if let Some(path) = get_config_path() {
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            match parse_config(&content) {
                Ok(parsed) => config = parsed,
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to parse config file: {}. Using defaults.",
                        e
                    );
                }
            }
        }
    }

    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

pub fn generate_config_sample() -> Result<(), FinsightError> {
    let config_path = get_config_path();

    if let Some(path) = config_path {
        if path.exists() {
            eprintln!("Config file already exists at: {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let sample = Config::default();
        let toml_content = toml::to_string_pretty(&sample)
            .map_err(|e| FinsightError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(&path, toml_content)
            .map_err(|e| FinsightError::Config(format!("Failed to write config file: {}", e)))?;
        println!("Generated config file at: {}", path.display());
    } else {
        return Err(FinsightError::Config(
            "Cannot determine config directory".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("query_cache"));
        assert!(is_identifier("_v2"));
        assert!(!is_identifier("2cache"));
        assert!(!is_identifier("cache; DROP TABLE x"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_database_path_uses_store_path() {
        let mut config = Config::default();
        config.store.path = Some("/tmp/finsight-test".to_string());
        config.store.database = "cache".to_string();
        assert_eq!(
            get_database_path(&config),
            PathBuf::from("/tmp/finsight-test/cache.db")
        );
    }
}
