//! Second-stage reranking with a cross-encoder service, plus TTL-based
//! score decay for working memories.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RerankerConfig;
use crate::error::{MemoryError, Result};
use crate::types::Entry;

/// Multiplier applied to entries past their TTL.
const EXPIRED_DECAY: f64 = 0.3;
/// Multiplier applied to entries past 80% of their TTL.
const AGING_DECAY: f64 = 0.7;
/// Fraction of the TTL at which aging decay begins.
const AGING_THRESHOLD: f64 = 0.8;

/// Metadata key carrying the TTL-adjusted relevance of a reranked entry.
const RERANK_SCORE_KEY: &str = "rerank_score";

fn rerank_score(entry: &Entry) -> f64 {
    entry
        .metadata
        .as_ref()
        .and_then(|m| m.get(RERANK_SCORE_KEY))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

/// One scored item from the reranking service.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankItem {
    pub index: Option<i64>,
    pub relevance_score: Option<f64>,
    pub score: Option<f64>,
}

impl RerankItem {
    pub fn relevance(&self) -> Option<f64> {
        self.relevance_score.or(self.score)
    }
}

/// Scores documents against a query.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankItem>>;
}

/// Cross-encoder scoring over HTTP.
pub struct HttpRelevanceScorer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRelevanceScorer {
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| MemoryError::Config("Reranker enabled without a URL".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl RelevanceScorer for HttpRelevanceScorer {
    async fn score(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankItem>> {
        let mut request = self.client.post(&self.url).json(&serde_json::json!({
            "query": query,
            "documents": documents,
            "top_k": top_k,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MemoryError::Rerank(format!(
                "Reranking service returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        parse_response(body)
    }
}

/// Validate the service response shape and extract the result items.
fn parse_response(body: Value) -> Result<Vec<RerankItem>> {
    let results = body
        .get("results")
        .ok_or_else(|| MemoryError::Rerank("Response has no results field".to_string()))?;
    if !results.is_array() {
        return Err(MemoryError::Rerank(
            "Response results field is not an array".to_string(),
        ));
    }
    serde_json::from_value(results.clone()).map_err(MemoryError::Json)
}

/// Reorders search results by cross-encoder relevance, decaying the scores
/// of aging working memories.
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
    default_top_k: usize,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, default_top_k: usize) -> Self {
        Self {
            scorer,
            default_top_k,
        }
    }

    /// Build a reranker over the HTTP scorer from configuration.
    pub fn from_config(config: &RerankerConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpRelevanceScorer::new(config)?),
            config.top_k,
        ))
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Rerank `entries` by relevance to `query`, keeping at most `top_k`.
    ///
    /// Items whose index falls outside the input range are skipped with a
    /// warning. Surviving entries carry the TTL-adjusted relevance as
    /// `rerank_score` and `reranked = true` in their metadata; `score`
    /// keeps the original vector similarity.
    pub async fn rerank(
        &self,
        query: &str,
        entries: &[Entry],
        top_k: usize,
    ) -> Result<Vec<Entry>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<String> = entries.iter().map(|e| e.content.clone()).collect();
        let items = self.scorer.score(query, &documents, top_k).await?;

        let mut reranked = Vec::with_capacity(items.len().min(top_k));
        for item in items {
            let Some(index) = item.index.filter(|i| (0..entries.len() as i64).contains(i))
            else {
                warn!(index = ?item.index, "Rerank item index out of range, skipping");
                continue;
            };
            let Some(relevance) = item.relevance() else {
                warn!(index, "Rerank item has no score, skipping");
                continue;
            };

            let mut entry = entries[index as usize].clone();
            let adjusted = apply_ttl_decay(&entry, relevance);
            let metadata = entry.metadata.get_or_insert_with(Default::default);
            metadata.insert(RERANK_SCORE_KEY.to_string(), adjusted.into());
            metadata.insert("reranked".to_string(), Value::Bool(true));
            reranked.push(entry);
        }

        // Sort after decay so expired entries sink.
        reranked.sort_by(|a, b| {
            let a = rerank_score(a);
            let b = rerank_score(b);
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(top_k);

        debug!(input = entries.len(), kept = reranked.len(), "Reranked entries");
        Ok(reranked)
    }
}

/// Decay the relevance of working memories that are nearing or past their
/// TTL. Entries without the full TTL annotation pass through unchanged, as
/// do entries whose timestamp fails to parse.
fn apply_ttl_decay(entry: &Entry, score: f64) -> f64 {
    let Some(metadata) = &entry.metadata else {
        return score;
    };
    if metadata.get("memory_type").and_then(Value::as_str) != Some("working") {
        return score;
    }
    let Some(ttl_days) = metadata
        .get("ttl_days")
        .and_then(Value::as_f64)
        .filter(|ttl| *ttl > 0.0)
    else {
        return score;
    };
    let Some(timestamp) = metadata
        .get("timestamp")
        .and_then(Value::as_str)
        .filter(|ts| !ts.is_empty())
    else {
        return score;
    };

    let created = match DateTime::parse_from_rfc3339(timestamp) {
        Ok(created) => created.with_timezone(&Utc),
        Err(e) => {
            warn!(timestamp, error = %e, "Unparseable entry timestamp, skipping TTL decay");
            return score;
        }
    };

    let age_days = (Utc::now() - created).num_days() as f64;
    if age_days > ttl_days {
        score * EXPIRED_DECAY
    } else if age_days > ttl_days * AGING_THRESHOLD {
        score * AGING_DECAY
    } else {
        score
    }
}
