//! Entry storage and single-collection retrieval.

use std::sync::Arc;

use qdrant_client::qdrant::Filter;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::index::{CollectionSpec, VectorIndex};
use crate::providers::EmbeddingProvider;
use crate::types::{DeleteOutcome, Entry, FieldIndexType, Metadata, Vector};

/// Payload key entries are written under.
const DOCUMENT_KEY: &str = "document";
/// Legacy payload key read first, for externally populated collections.
const LEGACY_DOCUMENT_KEY: &str = "page_content";
const METADATA_KEY: &str = "metadata";

/// Stores and retrieves entries against a vector index, provisioning
/// collections lazily on first write.
pub struct EntryStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    default_collection: Option<String>,
    field_indexes: Vec<(String, FieldIndexType)>,
}

impl EntryStore {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        default_collection: Option<String>,
        field_indexes: Vec<(String, FieldIndexType)>,
    ) -> Self {
        Self {
            index,
            embedder,
            default_collection,
            field_indexes,
        }
    }

    pub fn default_collection(&self) -> Option<&str> {
        self.default_collection.as_deref()
    }

    fn resolve_collection<'a>(&'a self, collection: Option<&'a str>) -> Result<&'a str> {
        collection
            .or(self.default_collection.as_deref())
            .ok_or_else(|| {
                MemoryError::InvalidArgument(
                    "No collection specified and no default configured".to_string(),
                )
            })
    }

    /// Create the collection if it does not exist yet. Idempotent.
    pub async fn ensure_collection(&self, collection: &str) -> Result<()> {
        if self.index.collection_exists(collection).await? {
            return Ok(());
        }
        let spec = CollectionSpec {
            vector_name: self.embedder.vector_name(),
            vector_size: self.embedder.vector_size() as u64,
            field_indexes: self.field_indexes.clone(),
        };
        self.index.create_collection(collection, &spec).await
    }

    /// Embed and store an entry, returning its assigned id.
    pub async fn store(&self, entry: Entry, collection: Option<&str>) -> Result<String> {
        if entry.content.trim().is_empty() {
            return Err(MemoryError::InvalidArgument(
                "Entry content must not be empty".to_string(),
            ));
        }
        let collection = self.resolve_collection(collection)?;
        self.ensure_collection(collection).await?;

        // Stored content goes through the document path; asymmetric models
        // embed passages and queries differently.
        let mut vectors = self
            .embedder
            .embed_documents(std::slice::from_ref(&entry.content))
            .await
            .map_err(|e| MemoryError::Store(format!("Failed to embed entry: {e}")))?;
        let vector = vectors.pop().ok_or_else(|| {
            MemoryError::Store("Embedding provider returned no vector".to_string())
        })?;

        // Ids are assigned here; any incoming id is ignored so a caller
        // cannot overwrite an existing point.
        let id = Uuid::new_v4().to_string();

        let mut payload = Metadata::new();
        payload.insert(DOCUMENT_KEY.to_string(), Value::String(entry.content));
        payload.insert(
            METADATA_KEY.to_string(),
            entry.metadata.map(Value::Object).unwrap_or(Value::Null),
        );

        self.index
            .upsert(
                collection,
                &id,
                &self.embedder.vector_name(),
                vector,
                payload,
            )
            .await
            .map_err(|e| MemoryError::Store(format!("Failed to upsert entry: {e}")))?;

        debug!(collection, id, "Stored entry");
        Ok(id)
    }

    /// Fetch an entry by id. Missing entries and transport failures both
    /// resolve to `None`; failures are logged.
    pub async fn retrieve(&self, id: &str, collection: Option<&str>) -> Result<Option<Entry>> {
        let collection = self.resolve_collection(collection)?;

        let point = match self.index.get(collection, id).await {
            Ok(point) => point,
            Err(e) => {
                error!(collection, id, error = %e, "Failed to retrieve entry");
                return Ok(None);
            }
        };

        Ok(point.map(|point| {
            let content = read_content(&point.payload);
            Entry {
                content,
                metadata: read_metadata(&point.payload),
                id: Some(point.id),
                score: None,
            }
        }))
    }

    /// Similarity search against one collection. A missing collection is
    /// indistinguishable from an empty one.
    pub async fn search(
        &self,
        query: &str,
        collection: Option<&str>,
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<Entry>> {
        let collection = self.resolve_collection(collection)?;
        let vector = self.embedder.embed_query(query).await?;
        self.search_with_vector(collection, &vector, limit, filter)
            .await
    }

    /// Search a collection with a precomputed query vector.
    pub(crate) async fn search_with_vector(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<Entry>> {
        if !self.index.collection_exists(collection).await? {
            warn!(collection, "Search against missing collection");
            return Ok(Vec::new());
        }

        let hits = self
            .index
            .query(
                collection,
                vector,
                &self.embedder.vector_name(),
                limit,
                filter,
            )
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| Entry {
                content: read_content(&hit.payload),
                metadata: read_metadata(&hit.payload),
                id: Some(hit.id),
                score: Some(hit.score),
            })
            .collect())
    }

    /// Delete entries by id list or by filter. Exactly one selector must be
    /// given. A missing collection is a successful no-op.
    pub async fn delete(
        &self,
        collection: Option<&str>,
        point_ids: Option<Vec<String>>,
        filter: Option<Filter>,
    ) -> Result<DeleteOutcome> {
        let collection = self.resolve_collection(collection)?;

        enum Selector {
            Ids(Vec<String>),
            Filter(Filter),
        }

        let selector = match (point_ids, filter) {
            (Some(_), Some(_)) => {
                return Err(MemoryError::InvalidArgument(
                    "Provide either point ids or a filter, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(MemoryError::InvalidArgument(
                    "Provide point ids or a filter to delete".to_string(),
                ));
            }
            (Some(ids), None) => Selector::Ids(ids),
            (None, Some(filter)) => Selector::Filter(filter),
        };

        if !self.index.collection_exists(collection).await? {
            return Ok(DeleteOutcome::noop());
        }

        let status = match selector {
            Selector::Ids(ids) => self.index.delete_by_ids(collection, &ids).await?,
            Selector::Filter(filter) => self.index.delete_by_filter(collection, filter).await?,
        };

        debug!(collection, status = %status.status, "Deleted entries");
        Ok(DeleteOutcome {
            status: status.status,
            operation_id: status.operation_id,
            deleted_count: None,
        })
    }

    /// Names of all live collections in the index.
    pub async fn collection_names(&self) -> Result<Vec<String>> {
        self.index.list_collections().await
    }

    pub(crate) async fn embed_query(&self, query: &str) -> Result<Vector> {
        self.embedder.embed_query(query).await
    }
}

fn read_content(payload: &Metadata) -> String {
    payload
        .get(LEGACY_DOCUMENT_KEY)
        .or_else(|| payload.get(DOCUMENT_KEY))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn read_metadata(payload: &Metadata) -> Option<Metadata> {
    match payload.get(METADATA_KEY) {
        Some(Value::Object(map)) => Some(map.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_content_prefers_legacy_key() {
        let mut payload = Metadata::new();
        payload.insert("page_content".to_string(), json!("legacy"));
        payload.insert("document".to_string(), json!("current"));
        assert_eq!(read_content(&payload), "legacy");

        let mut payload = Metadata::new();
        payload.insert("document".to_string(), json!("current"));
        assert_eq!(read_content(&payload), "current");

        assert_eq!(read_content(&Metadata::new()), "");
    }

    #[test]
    fn test_read_metadata_requires_object() {
        let mut payload = Metadata::new();
        payload.insert("metadata".to_string(), json!({"k": "v"}));
        let metadata = read_metadata(&payload).unwrap();
        assert_eq!(metadata.get("k"), Some(&json!("v")));

        let mut payload = Metadata::new();
        payload.insert("metadata".to_string(), Value::Null);
        assert!(read_metadata(&payload).is_none());
    }
}
