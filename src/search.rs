//! Concurrent fan-out search across multiple collections.

use std::sync::Arc;

use qdrant_client::qdrant::Filter;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::EntryStore;
use crate::types::Entry;

/// Passing `["*"]` as the collection list searches every live collection.
pub const ALL_COLLECTIONS_SENTINEL: &str = "*";

/// Fans a query out over several collections concurrently and merges the
/// results into a single score-ordered list.
pub struct MultiCollectionSearch {
    store: Arc<EntryStore>,
    limit_multiplier: usize,
}

impl MultiCollectionSearch {
    pub fn new(store: Arc<EntryStore>, limit_multiplier: usize) -> Self {
        Self {
            store,
            limit_multiplier,
        }
    }

    /// Search `collections` for `query`.
    ///
    /// A `None` collection list falls back to the store's default
    /// collection; with no default either, the result is empty. Failures in
    /// individual collections are logged and excluded, never propagated.
    pub async fn search(
        &self,
        query: &str,
        collections: Option<Vec<String>>,
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<Entry>> {
        let targets = self.resolve_targets(collections).await?;
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        // The query is embedded exactly once, then shared across tasks.
        let vector = self.store.embed_query(query).await?;

        let mut handles = Vec::with_capacity(targets.len());
        for collection in &targets {
            let store = Arc::clone(&self.store);
            let collection = collection.clone();
            let vector = vector.clone();
            let filter = filter.clone();
            handles.push(tokio::spawn(async move {
                let entries = store
                    .search_with_vector(&collection, &vector, limit, filter)
                    .await;
                (collection, entries)
            }));
        }

        // Awaiting in launch order keeps the merge deterministic.
        let mut merged = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((collection, Ok(entries))) => {
                    for mut entry in entries {
                        let metadata = entry.metadata.get_or_insert_with(Default::default);
                        metadata.insert(
                            "collection".to_string(),
                            Value::String(collection.clone()),
                        );
                        merged.push(entry);
                    }
                }
                Ok((collection, Err(e))) => {
                    warn!(collection, error = %e, "Collection search failed, excluding");
                }
                Err(e) => {
                    warn!(error = %e, "Collection search task panicked, excluding");
                }
            }
        }

        merged.sort_by(|a, b| {
            let a = a.score.unwrap_or(0.0);
            let b = b.score.unwrap_or(0.0);
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });

        let cap = if targets.len() > 1 {
            limit * targets.len().min(self.limit_multiplier)
        } else {
            limit
        };
        merged.truncate(cap);

        debug!(
            collections = targets.len(),
            results = merged.len(),
            "Fan-out search complete"
        );
        Ok(merged)
    }

    async fn resolve_targets(&self, collections: Option<Vec<String>>) -> Result<Vec<String>> {
        match collections {
            None => Ok(self
                .store
                .default_collection()
                .map(|name| vec![name.to_string()])
                .unwrap_or_default()),
            Some(list) if list.len() == 1 && list[0] == ALL_COLLECTIONS_SENTINEL => {
                self.store.collection_names().await
            }
            Some(list) => Ok(list),
        }
    }
}
