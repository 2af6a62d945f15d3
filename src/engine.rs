//! Query engine: the façade tying provider, index, and ranker together.
//!
//! A query is embedded first (outside any index lock), searched per
//! modality, then ranked — with weighted fusion when both modalities are
//! present. When one of two requested embeddings fails, the engine degrades
//! to the surviving modality and reports a warning instead of failing the
//! whole query.

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::index::{ScoredCandidate, SharedIndex};
use crate::metrics::{MetricsCollector, MetricsReport};
use crate::ranker::{self, ModalityWeights, RankedResult, DEFAULT_OVERFETCH_FACTOR};
use crate::vector::{ItemId, Modality, Vector};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Engine-level configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Multiple of k fetched per modality before fusion.
    pub overfetch_factor: usize,
    /// Weights used when a query does not supply its own.
    pub default_weights: ModalityWeights,
    /// Per-query deadline; None disables the timeout.
    pub deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
            default_weights: ModalityWeights::default(),
            deadline: None,
        }
    }
}

/// A search request: text, image, or both.
#[derive(Debug, Clone, Default)]
pub struct QueryInput {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
    /// Overrides the engine's default fusion weights when set.
    pub weights: Option<ModalityWeights>,
}

impl QueryInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }

    pub fn multimodal(text: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            text: Some(text.into()),
            image: Some(image),
            weights: None,
        }
    }

    pub fn with_weights(mut self, weights: ModalityWeights) -> Self {
        self.weights = Some(weights);
        self
    }
}

/// Non-fatal problems encountered while answering a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// One of two requested modalities failed to embed; results come from
    /// the other one alone.
    ModalityDropped { modality: Modality, reason: String },
}

/// Ranked results plus any non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub results: Vec<RankedResult>,
    pub warnings: Vec<Warning>,
}

/// A catalog item to ingest; at least one modality must be present.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub id: ItemId,
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            text: None,
            image: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }
}

/// The retrieval façade. Stateless between calls; cheap to share behind
/// an `Arc` since queries only take index read locks.
pub struct QueryEngine<P: EmbeddingProvider> {
    provider: Arc<P>,
    index: SharedIndex,
    config: EngineConfig,
    metrics: RwLock<MetricsCollector>,
}

impl<P: EmbeddingProvider> QueryEngine<P> {
    /// Build an engine, failing fast if provider and index disagree on
    /// dimensionality.
    pub fn new(provider: Arc<P>, index: SharedIndex, config: EngineConfig) -> Result<Self> {
        let index_dims = index.dimensions()?;
        if provider.dimensions() != index_dims {
            return Err(SearchError::ConfigurationError {
                reason: format!(
                    "Embedding provider produces {}-dimensional vectors but the index expects {}",
                    provider.dimensions(),
                    index_dims
                ),
            });
        }
        config.default_weights.validate()?;
        Ok(Self {
            provider,
            index,
            config,
            metrics: RwLock::new(MetricsCollector::new()),
        })
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn metrics_report(&self) -> MetricsReport {
        self.metrics
            .read()
            .map(|m| m.report())
            .unwrap_or_else(|_| MetricsCollector::new().report())
    }

    fn record_query(&self, elapsed: Duration, degraded: bool) {
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_query(elapsed, degraded);
        }
    }

    fn record_ingest(&self, vectors: u64) {
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_ingest(vectors);
        }
    }

    fn check_deadline(start: Instant, deadline: Option<Duration>) -> Result<()> {
        if let Some(limit) = deadline {
            let elapsed = start.elapsed();
            if elapsed > limit {
                return Err(SearchError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    /// Answer a query with the engine's configured deadline.
    pub fn query(&self, input: QueryInput, k: usize) -> Result<QueryResponse> {
        self.query_with_deadline(input, k, self.config.deadline)
    }

    /// Answer a query with an explicit per-call deadline. On expiry the
    /// whole call fails with `Timeout`; partial results are never returned.
    pub fn query_with_deadline(
        &self,
        input: QueryInput,
        k: usize,
        deadline: Option<Duration>,
    ) -> Result<QueryResponse> {
        let start = Instant::now();
        let response = self.run_query(input, k, start, deadline)?;
        self.record_query(start.elapsed(), !response.warnings.is_empty());
        Ok(response)
    }

    fn run_query(
        &self,
        input: QueryInput,
        k: usize,
        start: Instant,
        deadline: Option<Duration>,
    ) -> Result<QueryResponse> {
        if k == 0 {
            return Err(SearchError::InvalidArgument {
                reason: "k must be at least 1".to_string(),
            });
        }
        if input.text.is_none() && input.image.is_none() {
            return Err(SearchError::InvalidQuery {
                reason: "Query must supply text, an image, or both".to_string(),
            });
        }
        let weights = input.weights.unwrap_or(self.config.default_weights);
        weights.validate()?;

        // Embedding is the slow, external step; it happens before any
        // index lock is taken.
        let text_embedding = match input.text.as_deref() {
            Some(text) => {
                let embedded = self.provider.embed_text(text);
                Self::check_deadline(start, deadline)?;
                Some(embedded)
            }
            None => None,
        };
        let image_embedding = match input.image.as_deref() {
            Some(image) => {
                let embedded = self.provider.embed_image(image);
                Self::check_deadline(start, deadline)?;
                Some(embedded)
            }
            None => None,
        };

        let response = match (text_embedding, image_embedding) {
            (Some(Ok(text_vec)), Some(Ok(image_vec))) => {
                let fetch = k.saturating_mul(self.config.overfetch_factor.max(1));
                let text_candidates = self.search_modality(&text_vec, fetch, Modality::Text)?;
                Self::check_deadline(start, deadline)?;
                let image_candidates =
                    self.search_modality(&image_vec, fetch, Modality::Image)?;
                let results = ranker::fuse(text_candidates, image_candidates, weights, k)?;
                QueryResponse {
                    results,
                    warnings: vec![],
                }
            }
            // One of two embeddings failed: degrade to the survivor.
            (Some(Ok(text_vec)), Some(Err(image_err))) => QueryResponse {
                results: ranker::rank(
                    self.search_modality(&text_vec, k, Modality::Text)?,
                    k,
                ),
                warnings: vec![Warning::ModalityDropped {
                    modality: Modality::Image,
                    reason: image_err.to_string(),
                }],
            },
            (Some(Err(text_err)), Some(Ok(image_vec))) => QueryResponse {
                results: ranker::rank(
                    self.search_modality(&image_vec, k, Modality::Image)?,
                    k,
                ),
                warnings: vec![Warning::ModalityDropped {
                    modality: Modality::Text,
                    reason: text_err.to_string(),
                }],
            },
            (Some(Err(text_err)), Some(Err(_))) => return Err(text_err),
            (Some(Ok(text_vec)), None) => QueryResponse {
                results: ranker::rank(
                    self.search_modality(&text_vec, k, Modality::Text)?,
                    k,
                ),
                warnings: vec![],
            },
            (None, Some(Ok(image_vec))) => QueryResponse {
                results: ranker::rank(
                    self.search_modality(&image_vec, k, Modality::Image)?,
                    k,
                ),
                warnings: vec![],
            },
            (Some(Err(err)), None) | (None, Some(Err(err))) => return Err(err),
            (None, None) => unreachable!("rejected above"),
        };

        Self::check_deadline(start, deadline)?;
        Ok(response)
    }

    fn search_modality(
        &self,
        query: &Vector,
        k: usize,
        modality: Modality,
    ) -> Result<Vec<ScoredCandidate>> {
        self.index.search(query, k, Some(modality))
    }

    /// Embed a catalog record and insert its vectors in one write section.
    /// Any embedding failure aborts before the index is touched.
    pub fn ingest(&self, record: &CatalogRecord) -> Result<usize> {
        let entries = self.embed_record(record)?;
        let count = entries.len();
        self.index.bulk_insert(entries)?;
        self.record_ingest(count as u64);
        Ok(count)
    }

    /// Embed a whole batch up front, then apply it under one write lock.
    pub fn ingest_batch(&self, records: &[CatalogRecord]) -> Result<usize> {
        let mut entries = Vec::new();
        for record in records {
            entries.extend(self.embed_record(record)?);
        }
        let count = entries.len();
        self.index.bulk_insert(entries)?;
        self.record_ingest(count as u64);
        Ok(count)
    }

    fn embed_record(&self, record: &CatalogRecord) -> Result<Vec<(ItemId, Modality, Vector)>> {
        if record.text.is_none() && record.image.is_none() {
            return Err(SearchError::InvalidArgument {
                reason: format!("Record {} has neither text nor image", record.id),
            });
        }
        let mut entries = Vec::with_capacity(2);
        if let Some(text) = record.text.as_deref() {
            entries.push((
                record.id.clone(),
                Modality::Text,
                self.provider.embed_text(text)?,
            ));
        }
        if let Some(image) = record.image.as_deref() {
            entries.push((
                record.id.clone(),
                Modality::Image,
                self.provider.embed_image(image)?,
            ));
        }
        Ok(entries)
    }

    /// Remove every vector an item owns.
    pub fn remove_item(&self, id: &ItemId) -> Result<()> {
        self.index.remove_item(id)?;
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_remove();
        }
        Ok(())
    }
}
