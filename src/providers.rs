//! Embedding providers.
//!
//! Three implementations of [`EmbeddingProvider`]: FastEmbed for local
//! models, an OpenAI-compatible HTTP client for remote services, and a
//! deterministic mock for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::Deserialize;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{MemoryError, Result};
use crate::types::{Vector, normalize};

/// Produces vector embeddings for queries and documents.
///
/// `vector_name` identifies the vector field entries are written under; an
/// empty name means the collection's default unnamed vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vector>;

    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vector>>;

    fn vector_name(&self) -> String;

    fn vector_size(&self) -> usize;
}

/// Build a provider from configuration.
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model_name)?)),
        "openai" | "openai-compatible" => {
            Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
        }
        "mock" => Ok(Arc::new(MockProvider::new(
            config.vector_size.unwrap_or(384),
        ))),
        other => Err(MemoryError::Config(format!(
            "Unknown embedding provider: {other}"
        ))),
    }
}

/// Local embedding via fastembed. Inference is synchronous, so calls are
/// routed through `spawn_blocking`.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    vector_size: usize,
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self> {
        let (model_kind, vector_size) = resolve_model(model_name)?;

        debug!(model = model_name, vector_size, "Initializing fastembed model");
        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind).with_show_download_progress(false),
        )
        .map_err(|e| MemoryError::Embedding(format!("Failed to load model {model_name}: {e}")))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            vector_size,
        })
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vector>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| MemoryError::Embedding(format!("Embedding failed: {e}")))
        })
        .await
        .map_err(|e| MemoryError::Embedding(format!("Embedding task panicked: {e}")))?
    }
}

fn resolve_model(model_name: &str) -> Result<(EmbeddingModel, usize)> {
    let basename = model_basename(model_name);
    match basename.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        _ => Err(MemoryError::Config(format!(
            "Unsupported fastembed model: {model_name}"
        ))),
    }
}

fn model_basename(model_name: &str) -> &str {
    model_name.rsplit('/').next().unwrap_or(model_name)
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_query(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.embed_batch(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| MemoryError::Embedding("Model returned no embedding".to_string()))
    }

    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vector>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_batch(documents.to_vec()).await
    }

    fn vector_name(&self) -> String {
        format!("fast-{}", model_basename(&self.model_name).to_lowercase())
    }

    fn vector_size(&self) -> usize {
        self.vector_size
    }
}

/// Remote embedding over an OpenAI-compatible `/embeddings` endpoint.
///
/// Uses the collection's default unnamed vector field.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_name: String,
    vector_size: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsItem {
    embedding: Vector,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.base_url.clone().ok_or_else(|| {
            MemoryError::Config("OpenAI-compatible provider requires a base URL".to_string())
        })?;
        let vector_size = config.vector_size.ok_or_else(|| {
            MemoryError::Config(
                "OpenAI-compatible provider requires an explicit vector size".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            vector_size,
        })
    }

    async fn request_embeddings(&self, input: &[String]) -> Result<Vec<Vector>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut request = self.client.post(&url).json(&serde_json::json!({
            "input": input,
            "model": self.model_name,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MemoryError::Embedding(format!(
                "Embedding service returned {}",
                response.status()
            )));
        }

        let body: EmbeddingsResponse = response.json().await?;
        if body.data.len() != input.len() {
            return Err(MemoryError::Embedding(format!(
                "Expected {} embeddings, got {}",
                input.len(),
                body.data.len()
            )));
        }
        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed_query(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.request_embeddings(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| MemoryError::Embedding("Service returned no embedding".to_string()))
    }

    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vector>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(documents).await
    }

    fn vector_name(&self) -> String {
        String::new()
    }

    fn vector_size(&self) -> usize {
        self.vector_size
    }
}

/// Deterministic hash-based provider for tests. Identical inputs always
/// produce identical unit vectors.
pub struct MockProvider {
    vector_size: usize,
}

impl MockProvider {
    pub fn new(vector_size: usize) -> Self {
        Self { vector_size }
    }

    fn hash_embed(&self, text: &str) -> Vector {
        let mut vector = vec![0.0f32; self.vector_size];
        for (i, byte) in text.bytes().enumerate() {
            let idx = (i * 31 + byte as usize) % self.vector_size;
            vector[idx] += (byte as f32) / 255.0;
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed_query(&self, text: &str) -> Result<Vector> {
        Ok(self.hash_embed(text))
    }

    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vector>> {
        Ok(documents.iter().map(|d| self.hash_embed(d)).collect())
    }

    fn vector_name(&self) -> String {
        String::new()
    }

    fn vector_size(&self) -> usize {
        self.vector_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn test_mock_provider_deterministic() {
        let provider = MockProvider::new(64);
        let a = provider.embed_query("hello world").await.unwrap();
        let b = provider.embed_query("hello world").await.unwrap();
        assert_eq!(a, b);

        let c = provider.embed_query("something else").await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_mock_provider_unit_length() {
        let provider = MockProvider::new(32);
        let v = provider.embed_query("normalize me").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_fastembed_vector_name_convention() {
        assert_eq!(
            model_basename("sentence-transformers/all-MiniLM-L6-v2"),
            "all-MiniLM-L6-v2"
        );
        assert_eq!(model_basename("bge-small-en-v1.5"), "bge-small-en-v1.5");
    }

    #[test]
    fn test_resolve_model_sizes() {
        let (_, size) = resolve_model("sentence-transformers/all-MiniLM-L6-v2").unwrap();
        assert_eq!(size, 384);
        let (_, size) = resolve_model("BAAI/bge-base-en-v1.5").unwrap();
        assert_eq!(size, 768);
        assert!(resolve_model("unknown/model").is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(create_embedding_provider(&config).is_err());
    }
}
