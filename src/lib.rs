//! # modalsearch
//!
//! A multimodal vector retrieval engine for product search: catalog items
//! are embedded per modality (text and image) into one shared vector space,
//! stored unit-normalized in a searchable index, and retrieved by top-k
//! cosine similarity with deterministic, reproducible ranking.
//!
//! This crate provides:
//! - Dimension-checked vector storage keyed by (item, modality)
//! - Exact and HNSW-approximate search behind one strategy contract
//! - Cross-modal weighted score fusion with deterministic tie-breaking
//! - A query façade with graceful single-modality fallback and deadlines
//! - Snapshot/restore so catalogs need not be re-embedded at startup
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use modalsearch::{
//!     CatalogRecord, EngineConfig, HashEmbedder, IndexConfig, QueryEngine,
//!     QueryInput, SharedIndex, VectorIndex,
//! };
//!
//! let provider = Arc::new(HashEmbedder::new(64).unwrap());
//! let index = SharedIndex::new(VectorIndex::new(IndexConfig::exact(64)).unwrap());
//! let engine = QueryEngine::new(provider, index, EngineConfig::default()).unwrap();
//!
//! engine
//!     .ingest(&CatalogRecord::new("shoe-1").with_text("blue running shoe"))
//!     .unwrap();
//!
//! let response = engine.query(QueryInput::from_text("running shoe"), 5).unwrap();
//! assert_eq!(response.results[0].id.as_str(), "shoe-1");
//! ```

pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod ranker;
pub mod vector;

pub use embedding::{EmbeddingProvider, HashEmbedder};
pub use engine::{CatalogRecord, EngineConfig, QueryEngine, QueryInput, QueryResponse, Warning};
pub use error::{Result, SearchError};
pub use index::{
    ExactStrategy, HnswParams, HnswStrategy, IndexConfig, IndexKind, ScoredCandidate,
    SearchStrategy, SharedIndex, SnapshotManager, VectorIndex,
};
pub use metrics::{MetricsCollector, MetricsReport};
pub use ranker::{ModalityWeights, RankedResult};
pub use vector::{ItemId, Modality, Vector};
