//! Vector index: stores per-modality item embeddings and answers
//! top-k cosine similarity queries.
//!
//! The index owns all stored vectors and keeps them unit-normalized, so
//! similarity is a raw dot product. Search backends are pluggable via
//! [`SearchStrategy`], selected once at construction: [`ExactStrategy`]
//! scans every vector (the correctness baseline), [`HnswStrategy`] is the
//! approximate graph backend.

pub mod exact;
pub mod hnsw;
pub mod shared;
pub mod snapshot;
pub mod top_k;

pub use exact::ExactStrategy;
pub use hnsw::{HnswParams, HnswStrategy};
pub use shared::SharedIndex;
pub use snapshot::{IndexSnapshot, SnapshotManager};

use crate::error::{Result, SearchError};
use crate::vector::{ItemId, Modality, Vector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Scores closer than this are considered tied and ordered by item id.
pub const SCORE_EPSILON: f32 = 1e-6;

/// Key of a stored vector: one entry per (item, modality).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub id: ItemId,
    pub modality: Modality,
}

impl EntryKey {
    pub fn new(id: ItemId, modality: Modality) -> Self {
        Self { id, modality }
    }
}

/// A similarity match produced by a search. Ephemeral, valid for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub id: ItemId,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Order candidates by descending score; ties (within [`SCORE_EPSILON`])
/// by ascending item id.
///
/// The epsilon rule is applied as a second pass over adjacent runs of the
/// already-sorted list, so the comparator used for sorting stays a total
/// order.
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

    let mut start = 0;
    while start < candidates.len() {
        let mut end = start + 1;
        while end < candidates.len()
            && (candidates[end - 1].score - candidates[end].score).abs() <= SCORE_EPSILON
        {
            end += 1;
        }
        if end - start > 1 {
            candidates[start..end].sort_by(|a, b| a.id.cmp(&b.id));
        }
        start = end;
    }
}

/// Search backend selected at index construction.
#[derive(Debug, Clone)]
pub enum IndexKind {
    /// Exhaustive scan over all stored vectors. Exact results.
    Exact,
    /// HNSW graph. Approximate; validated against the exact baseline
    /// by recall tests.
    Hnsw(HnswParams),
}

/// Index construction parameters.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Dimensionality every stored and query vector must have.
    pub dimensions: usize,
    pub kind: IndexKind,
}

impl IndexConfig {
    pub fn exact(dimensions: usize) -> Self {
        Self {
            dimensions,
            kind: IndexKind::Exact,
        }
    }

    pub fn hnsw(dimensions: usize, params: HnswParams) -> Self {
        Self {
            dimensions,
            kind: IndexKind::Hnsw(params),
        }
    }
}

/// A pluggable k-NN search backend.
///
/// Backends work with `usize` slots assigned by the [`VectorIndex`]; the
/// entry key travels with the vector so backends can filter by modality
/// and tie-break by item id.
pub trait SearchStrategy: Send + Sync + fmt::Debug {
    /// Store a unit-normalized vector under the given slot.
    fn add(&mut self, slot: usize, key: EntryKey, vector: Vector) -> Result<()>;

    /// Remove the vector at the given slot. No-op if absent.
    fn remove(&mut self, slot: usize) -> Result<()>;

    /// Return up to `k` candidates by descending dot-product similarity
    /// to the unit-normalized `query`, restricted to `filter` if set.
    fn search(
        &self,
        query: &Vector,
        k: usize,
        filter: Option<Modality>,
    ) -> Result<Vec<ScoredCandidate>>;

    /// Look up the entry stored at a slot.
    fn entry(&self, slot: usize) -> Option<(&EntryKey, &Vector)>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The vector index: dimension enforcement, normalization, (id, modality)
/// keyed storage, and top-k search over a pluggable backend.
#[derive(Debug)]
pub struct VectorIndex {
    dimensions: usize,
    kind: IndexKind,
    strategy: Box<dyn SearchStrategy>,
    /// (item, modality) -> backend slot.
    slots: HashMap<EntryKey, usize>,
    next_slot: usize,
}

impl VectorIndex {
    /// Create an empty index. Fails with `ConfigurationError` if
    /// `dimensions` is zero.
    pub fn new(config: IndexConfig) -> Result<Self> {
        if config.dimensions == 0 {
            return Err(SearchError::ConfigurationError {
                reason: "Index dimensionality must be at least 1".to_string(),
            });
        }
        let strategy: Box<dyn SearchStrategy> = match &config.kind {
            IndexKind::Exact => Box::new(ExactStrategy::new()),
            IndexKind::Hnsw(params) => Box::new(HnswStrategy::new(params.clone())),
        };
        Ok(Self {
            dimensions: config.dimensions,
            kind: config.kind,
            strategy,
            slots: HashMap::new(),
            next_slot: 0,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn kind(&self) -> &IndexKind {
        &self.kind
    }

    /// Number of stored vectors (an item with both modalities counts twice).
    pub fn len(&self) -> usize {
        self.strategy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategy.is_empty()
    }

    /// Whether a vector is stored for the given (item, modality).
    pub fn contains(&self, id: &ItemId, modality: Modality) -> bool {
        self.slots.contains_key(&EntryKey::new(id.clone(), modality))
    }

    /// All distinct item ids, sorted.
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.slots.keys().map(|k| k.id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        if vector.dimension() != self.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.dimension(),
            });
        }
        Ok(())
    }

    /// Insert a vector for (id, modality), normalizing it to unit length.
    ///
    /// An existing entry under the same key is replaced wholesale. All
    /// validation happens before any mutation, so a failed insert leaves
    /// the index unchanged.
    pub fn insert(&mut self, id: ItemId, modality: Modality, vector: Vector) -> Result<()> {
        self.check_dimension(&vector)?;
        let normalized = vector.normalized()?;
        self.apply_insert(EntryKey::new(id, modality), normalized)
    }

    /// Insert many vectors at once. The whole batch is validated before
    /// any of it is applied.
    pub fn bulk_insert(&mut self, entries: Vec<(ItemId, Modality, Vector)>) -> Result<()> {
        let mut prepared = Vec::with_capacity(entries.len());
        for (id, modality, vector) in entries {
            self.check_dimension(&vector)?;
            let normalized = vector.normalized()?;
            prepared.push((EntryKey::new(id, modality), normalized));
        }
        for (key, vector) in prepared {
            self.apply_insert(key, vector)?;
        }
        Ok(())
    }

    fn apply_insert(&mut self, key: EntryKey, vector: Vector) -> Result<()> {
        if let Some(&old_slot) = self.slots.get(&key) {
            self.strategy.remove(old_slot)?;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.strategy.add(slot, key.clone(), vector)?;
        self.slots.insert(key, slot);
        Ok(())
    }

    /// Remove the vector for (id, modality). No-op if absent.
    pub fn remove(&mut self, id: &ItemId, modality: Modality) -> Result<()> {
        let key = EntryKey::new(id.clone(), modality);
        if let Some(slot) = self.slots.remove(&key) {
            self.strategy.remove(slot)?;
        }
        Ok(())
    }

    /// Search for the `k` most similar stored vectors.
    ///
    /// The query is normalized before scoring, so results are cosine
    /// similarities. Results are ordered by descending score with
    /// deterministic tie-breaking; fewer than `k` results are returned
    /// when the (filtered) index holds fewer entries.
    pub fn search(
        &self,
        query: &Vector,
        k: usize,
        filter: Option<Modality>,
    ) -> Result<Vec<ScoredCandidate>> {
        if k == 0 {
            return Err(SearchError::InvalidArgument {
                reason: "k must be at least 1".to_string(),
            });
        }
        self.check_dimension(query)?;
        if self.is_empty() {
            return Ok(vec![]);
        }
        let normalized = query.normalized()?;
        let mut candidates = self.strategy.search(&normalized, k, filter)?;
        // Unit-vector dot products can drift slightly past the valid range.
        for c in &mut candidates {
            c.score = c.score.clamp(-1.0, 1.0);
        }
        sort_candidates(&mut candidates);
        Ok(candidates)
    }

    /// Serialize the full vector set into an opaque snapshot blob.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut entries = Vec::with_capacity(self.slots.len());
        for &slot in self.slots.values() {
            if let Some((key, vector)) = self.strategy.entry(slot) {
                entries.push(snapshot::SnapshotEntry {
                    id: key.id.clone(),
                    modality: key.modality,
                    values: vector.as_slice().to_vec(),
                });
            }
        }
        // Stable on-disk ordering regardless of hash-map iteration.
        entries.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.modality.cmp(&b.modality)));
        snapshot::encode(&IndexSnapshot {
            dimensions: self.dimensions,
            entries,
        })
    }

    /// Rebuild an index of the given kind from a snapshot blob.
    pub fn restore(kind: IndexKind, blob: &[u8]) -> Result<Self> {
        let snapshot = snapshot::decode(blob)?;
        let mut index = Self::new(IndexConfig {
            dimensions: snapshot.dimensions,
            kind,
        })?;
        for entry in snapshot.entries {
            index.insert(entry.id, entry.modality, Vector::new(entry.values))?;
        }
        Ok(index)
    }
}
