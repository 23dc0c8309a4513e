//! High-level facade composing storage, fan-out search, and reranking.

use std::sync::Arc;

use qdrant_client::qdrant::Filter;
use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::providers::create_embedding_provider;
use crate::qdrant::QdrantIndex;
use crate::rerank::Reranker;
use crate::search::MultiCollectionSearch;
use crate::store::EntryStore;
use crate::types::{DeleteOutcome, Entry};

/// Options for a find request. `rerank` defaults to true; it only takes
/// effect when a reranker is configured.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Single collection to search. Ignored when `collections` is set.
    pub collection: Option<String>,
    /// Collections to fan out over; `["*"]` means all live collections.
    pub collections: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub filter: Option<Filter>,
    pub rerank: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            collection: None,
            collections: None,
            limit: None,
            filter: None,
            rerank: true,
        }
    }
}

/// The retrieval facade: find, store, delete, and retrieve-by-id.
pub struct MemoryService {
    store: Arc<EntryStore>,
    fanout: MultiCollectionSearch,
    reranker: Option<Reranker>,
    default_limit: usize,
    read_only: bool,
}

impl MemoryService {
    /// Assemble a service from already-constructed components. Used by
    /// tests and by callers with custom index or scorer implementations.
    pub fn new(
        store: Arc<EntryStore>,
        fanout: MultiCollectionSearch,
        reranker: Option<Reranker>,
        default_limit: usize,
        read_only: bool,
    ) -> Self {
        Self {
            store,
            fanout,
            reranker,
            default_limit,
            read_only,
        }
    }

    /// Production wiring: Qdrant index, configured embedding provider, and
    /// the HTTP reranker when enabled.
    pub fn connect(config: &MemoryConfig) -> Result<Self> {
        let index = Arc::new(QdrantIndex::connect(&config.qdrant)?);
        let embedder = create_embedding_provider(&config.embedding)?;

        let field_indexes = config
            .qdrant
            .filterable_fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type))
            .collect();
        let store = Arc::new(EntryStore::new(
            index,
            embedder,
            config.qdrant.default_collection.clone(),
            field_indexes,
        ));

        let fanout =
            MultiCollectionSearch::new(Arc::clone(&store), config.search.limit_multiplier);
        let reranker = if config.reranker.enabled {
            Some(Reranker::from_config(&config.reranker)?)
        } else {
            None
        };

        info!(
            default_collection = ?config.qdrant.default_collection,
            read_only = config.qdrant.read_only,
            reranking = reranker.is_some(),
            "Memory service initialized"
        );
        Ok(Self::new(
            store,
            fanout,
            reranker,
            config.search.default_limit,
            config.qdrant.read_only,
        ))
    }

    /// Search for entries relevant to `query`.
    ///
    /// Requires a resolvable collection: an explicit collection, a
    /// collection list, or a configured default. When reranking is
    /// requested and configured, a rerank failure falls back to the
    /// pre-rerank results with a warning.
    pub async fn find(&self, query: &str, options: FindOptions) -> Result<Vec<Entry>> {
        let limit = options.limit.unwrap_or(self.default_limit);

        if options.collections.is_none()
            && options.collection.is_none()
            && self.store.default_collection().is_none()
        {
            return Err(MemoryError::InvalidArgument(
                "No collection specified and no default configured".to_string(),
            ));
        }

        let entries = if options.collections.is_some() {
            self.fanout
                .search(query, options.collections, limit, options.filter)
                .await?
        } else {
            self.store
                .search(query, options.collection.as_deref(), limit, options.filter)
                .await?
        };

        let Some(reranker) = self.reranker.as_ref().filter(|_| options.rerank) else {
            return Ok(entries);
        };

        let top_k = limit.min(reranker.default_top_k());
        match reranker.rerank(query, &entries, top_k).await {
            Ok(reranked) => Ok(reranked),
            Err(e) => {
                warn!(error = %e, "Reranking failed, returning original results");
                Ok(entries)
            }
        }
    }

    /// Store an entry, returning its assigned id.
    pub async fn store(&self, entry: Entry, collection: Option<&str>) -> Result<String> {
        self.ensure_writable()?;
        self.store.store(entry, collection).await
    }

    /// Delete entries by id list or filter.
    pub async fn delete(
        &self,
        collection: Option<&str>,
        point_ids: Option<Vec<String>>,
        filter: Option<Filter>,
    ) -> Result<DeleteOutcome> {
        self.ensure_writable()?;
        self.store.delete(collection, point_ids, filter).await
    }

    /// Fetch an entry by id.
    pub async fn retrieve(&self, id: &str, collection: Option<&str>) -> Result<Option<Entry>> {
        self.store.retrieve(id, collection).await
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(MemoryError::InvalidArgument(
                "Service is in read-only mode".to_string(),
            ));
        }
        Ok(())
    }
}
