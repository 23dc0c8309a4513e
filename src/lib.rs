//! Semantic memory retrieval layer.
//!
//! Stores free-text entries with arbitrary metadata in a vector index and
//! retrieves them by nearest-neighbor search, optionally fanning out over
//! several collections concurrently and reranking the merged results with
//! an external cross-encoder service.
//!
//! # Architecture
//!
//! - [`EntryStore`]: collection lifecycle and entry CRUD against a
//!   [`VectorIndex`] (Qdrant in production, in-memory in tests).
//! - [`MultiCollectionSearch`]: concurrent fan-out search with
//!   per-collection failure isolation and score-ordered merging.
//! - [`Reranker`]: second-stage relevance scoring with TTL decay for
//!   working memories.
//! - [`MemoryService`]: the facade composing the above behind find /
//!   store / delete / retrieve.
//!
//! # Example
//!
//! ```no_run
//! use mnemo::prelude::*;
//!
//! # async fn example() -> mnemo::Result<()> {
//! let config = MemoryConfig::from_env()?;
//! let service = MemoryService::connect(&config)?;
//!
//! let id = service
//!     .store(Entry::new("The deploy pipeline runs at 03:00 UTC"), Some("ops"))
//!     .await?;
//!
//! let results = service
//!     .find("when do deploys happen?", FindOptions {
//!         collection: Some("ops".to_string()),
//!         ..Default::default()
//!     })
//!     .await?;
//! # let _ = (id, results);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod providers;
pub mod qdrant;
pub mod rerank;
pub mod search;
pub mod service;
pub mod store;
pub mod types;

pub use config::{
    EmbeddingConfig, FilterableField, MemoryConfig, QdrantConfig, RerankerConfig, SearchConfig,
};
pub use error::{MemoryError, Result};
pub use index::{CollectionSpec, DeleteStatus, SearchHit, StoredPoint, VectorIndex};
pub use providers::{
    EmbeddingProvider, FastEmbedProvider, MockProvider, OpenAiCompatibleProvider,
    create_embedding_provider,
};
pub use qdrant::QdrantIndex;
pub use rerank::{HttpRelevanceScorer, RelevanceScorer, RerankItem, Reranker};
pub use search::{ALL_COLLECTIONS_SENTINEL, MultiCollectionSearch};
pub use service::{FindOptions, MemoryService};
pub use store::EntryStore;
pub use types::{DeleteOutcome, Entry, FieldIndexType, Metadata, Vector, cosine_similarity};

/// Common imports for working with the memory layer.
pub mod prelude {
    pub use crate::config::MemoryConfig;
    pub use crate::error::{MemoryError, Result};
    pub use crate::service::{FindOptions, MemoryService};
    pub use crate::types::{DeleteOutcome, Entry, Metadata};
}
