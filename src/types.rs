//! Core types for memory storage and retrieval.

use serde::{Deserialize, Serialize};

/// A vector embedding.
pub type Vector = Vec<f32>;

/// Arbitrary JSON metadata attached to an entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single stored memory unit.
///
/// `id` is assigned at store time and is immutable afterwards. `score` is
/// only populated on entries returned from a search or rerank; it is never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Entry {
    /// Create a new entry with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
            id: None,
            score: None,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Scalar type of a payload field index, applied once at collection
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIndexType {
    Keyword,
    Integer,
    Float,
    Bool,
}

/// Outcome of a delete operation.
///
/// `deleted_count` is only set on the missing-collection no-op path, where
/// it is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<u64>,
}

impl DeleteOutcome {
    /// Successful no-op for a delete against a collection that does not exist.
    pub fn noop() -> Self {
        Self {
            status: "ok".to_string(),
            operation_id: None,
            deleted_count: Some(0),
        }
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = (a.iter().map(|x| x * x).sum::<f32>()).sqrt();
    let norm_b = (b.iter().map(|x| x * x).sum::<f32>()).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Normalize a vector to unit length.
pub fn normalize(v: &mut [f32]) {
    let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_relative_eq!(cosine_similarity(&a, &b), 1.0, epsilon = 1e-6);

        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert_relative_eq!(cosine_similarity(&a, &b), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0, 0.0];
        normalize(&mut v);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_entry_builder() {
        let mut metadata = Metadata::new();
        metadata.insert("k".to_string(), json!("v"));

        let entry = Entry::new("some content").with_metadata(metadata.clone());
        assert_eq!(entry.content, "some content");
        assert_eq!(entry.metadata, Some(metadata));
        assert!(entry.id.is_none());
        assert!(entry.score.is_none());
    }

    #[test]
    fn test_delete_outcome_noop() {
        let outcome = DeleteOutcome::noop();
        assert_eq!(outcome.status, "ok");
        assert_eq!(outcome.deleted_count, Some(0));
        assert!(outcome.operation_id.is_none());
    }
}
