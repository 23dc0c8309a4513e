//! Abstract vector index contract.
//!
//! [`VectorIndex`] is the seam between the storage logic and the vector
//! database. The production implementation lives in `qdrant.rs`; tests use
//! an in-memory implementation.

use async_trait::async_trait;
use qdrant_client::qdrant::Filter;

use crate::error::Result;
use crate::types::{FieldIndexType, Metadata, Vector};

/// Parameters for creating a collection.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Vector field name; empty means the default unnamed vector.
    pub vector_name: String,
    pub vector_size: u64,
    /// Payload field indexes created with the collection.
    pub field_indexes: Vec<(String, FieldIndexType)>,
}

/// A point fetched by id.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: String,
    pub payload: Metadata,
}

/// A point returned by a similarity query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: Metadata,
}

/// Acknowledgement of a delete request.
#[derive(Debug, Clone)]
pub struct DeleteStatus {
    pub status: String,
    pub operation_id: Option<u64>,
}

/// Operations the memory layer needs from a vector database.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn create_collection(&self, collection: &str, spec: &CollectionSpec) -> Result<()>;

    /// Insert or replace a single point.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector_name: &str,
        vector: Vector,
        payload: Metadata,
    ) -> Result<()>;

    /// Fetch a point by id. Missing points resolve to `None`.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredPoint>>;

    /// Nearest-neighbor query, results ordered by score descending.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        vector_name: &str,
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<SearchHit>>;

    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<DeleteStatus>;

    async fn delete_by_filter(&self, collection: &str, filter: Filter) -> Result<DeleteStatus>;
}
