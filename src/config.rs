//! Configuration for the memory retrieval layer.
//!
//! All configuration is immutable after construction: build a
//! [`MemoryConfig`] (from defaults, a deserialized file, or the
//! environment) and pass it to the component constructors.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::types::FieldIndexType;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl MemoryConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            qdrant: QdrantConfig::from_env()?,
            embedding: EmbeddingConfig::from_env()?,
            reranker: RerankerConfig::from_env()?,
            search: SearchConfig::from_env()?,
        })
    }
}

/// A payload field to index at collection creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterableField {
    pub name: String,
    pub field_type: FieldIndexType,
}

/// Connection and collection settings for the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// gRPC endpoint of the Qdrant server.
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_qdrant_timeout")]
    pub timeout_seconds: u64,
    /// Collection used when an operation does not name one.
    #[serde(default)]
    pub default_collection: Option<String>,
    /// When set, store and delete operations are rejected.
    #[serde(default)]
    pub read_only: bool,
    /// Payload indexes created alongside each new collection.
    #[serde(default)]
    pub filterable_fields: Vec<FilterableField>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key: None,
            timeout_seconds: default_qdrant_timeout(),
            default_collection: None,
            read_only: false,
            filterable_fields: Vec::new(),
        }
    }
}

impl QdrantConfig {
    fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = env_var("QDRANT_URL") {
            config.url = url;
        }
        config.api_key = env_var("QDRANT_API_KEY");
        config.default_collection = env_var("COLLECTION_NAME");
        if let Some(read_only) = env_var("QDRANT_READ_ONLY") {
            config.read_only = parse_bool("QDRANT_READ_ONLY", &read_only)?;
        }
        Ok(config)
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider kind: "fastembed", "openai", or "mock".
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model_name: String,
    /// Base URL for the OpenAI-compatible provider.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vector size for providers that cannot report it themselves.
    #[serde(default)]
    pub vector_size: Option<usize>,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model_name: default_embedding_model(),
            base_url: None,
            api_key: None,
            vector_size: None,
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(provider) = env_var("EMBEDDING_PROVIDER") {
            config.provider = provider;
        }
        if let Some(model) = env_var("EMBEDDING_MODEL") {
            config.model_name = model;
        }
        config.base_url = env_var("EMBEDDING_BASE_URL");
        config.api_key = env_var("EMBEDDING_API_KEY");
        if let Some(size) = env_var("EMBEDDING_VECTOR_SIZE") {
            config.vector_size = Some(parse_number("EMBEDDING_VECTOR_SIZE", &size)?);
        }
        Ok(config)
    }
}

/// Reranking service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Maximum number of results kept after reranking.
    #[serde(default = "default_reranker_top_k")]
    pub top_k: usize,
    #[serde(default = "default_reranker_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            api_key: None,
            top_k: default_reranker_top_k(),
            timeout_seconds: default_reranker_timeout(),
        }
    }
}

impl RerankerConfig {
    fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(enabled) = env_var("RERANKER_ENABLED") {
            config.enabled = parse_bool("RERANKER_ENABLED", &enabled)?;
        }
        config.url = env_var("RERANKER_URL");
        config.api_key = env_var("RERANKER_API_KEY");
        if let Some(top_k) = env_var("RERANKER_TOP_K") {
            config.top_k = parse_number("RERANKER_TOP_K", &top_k)?;
        }
        if let Some(timeout) = env_var("RERANKER_TIMEOUT") {
            config.timeout_seconds = parse_number("RERANKER_TIMEOUT", &timeout)?;
        }
        Ok(config)
    }
}

/// Search behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result limit when the caller does not specify one.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    /// Cap on the per-collection over-fetch factor in fan-out searches.
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            limit_multiplier: default_limit_multiplier(),
        }
    }
}

impl SearchConfig {
    fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(limit) = env_var("QDRANT_SEARCH_LIMIT") {
            config.default_limit = parse_number("QDRANT_SEARCH_LIMIT", &limit)?;
        }
        if let Some(multiplier) = env_var("QDRANT_MULTI_COLLECTION_LIMIT_MULTIPLIER") {
            config.limit_multiplier =
                parse_number("QDRANT_MULTI_COLLECTION_LIMIT_MULTIPLIER", &multiplier)?;
        }
        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(MemoryError::Config(format!(
            "{name} must be a boolean, got {value:?}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MemoryError::Config(format!("{name} must be a number, got {value:?}")))
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_qdrant_timeout() -> u64 {
    30
}

fn default_embedding_provider() -> String {
    "fastembed".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_reranker_top_k() -> usize {
    8
}

fn default_reranker_timeout() -> u64 {
    10
}

fn default_search_limit() -> usize {
    5
}

fn default_limit_multiplier() -> usize {
    3
}
