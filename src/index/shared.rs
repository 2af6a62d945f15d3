//! Thread-safe index handle: concurrent reads, exclusive writes.
//!
//! Searches take a read lock and may run in parallel; insert/remove/bulk
//! operations take the write lock so in-flight searches always observe a
//! consistent pre- or post-write view. Embedding work never happens inside
//! these critical sections.

use super::{ScoredCandidate, VectorIndex};
use crate::error::{Result, SearchError};
use crate::vector::{ItemId, Modality, Vector};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle to a shared [`VectorIndex`].
#[derive(Debug, Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<VectorIndex>>,
}

impl SharedIndex {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, VectorIndex>> {
        self.inner
            .read()
            .map_err(|_| SearchError::IndexError("Index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, VectorIndex>> {
        self.inner
            .write()
            .map_err(|_| SearchError::IndexError("Index lock poisoned".to_string()))
    }

    pub fn insert(&self, id: ItemId, modality: Modality, vector: Vector) -> Result<()> {
        self.write()?.insert(id, modality, vector)
    }

    /// Apply many inserts under one write critical section.
    pub fn bulk_insert(&self, entries: Vec<(ItemId, Modality, Vector)>) -> Result<()> {
        self.write()?.bulk_insert(entries)
    }

    pub fn remove(&self, id: &ItemId, modality: Modality) -> Result<()> {
        self.write()?.remove(id, modality)
    }

    /// Remove every vector an item owns, across both modalities.
    pub fn remove_item(&self, id: &ItemId) -> Result<()> {
        let mut index = self.write()?;
        index.remove(id, Modality::Text)?;
        index.remove(id, Modality::Image)?;
        Ok(())
    }

    pub fn search(
        &self,
        query: &Vector,
        k: usize,
        filter: Option<Modality>,
    ) -> Result<Vec<ScoredCandidate>> {
        self.read()?.search(query, k, filter)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn dimensions(&self) -> Result<usize> {
        Ok(self.read()?.dimensions())
    }

    pub fn item_ids(&self) -> Result<Vec<ItemId>> {
        Ok(self.read()?.item_ids())
    }

    pub fn contains(&self, id: &ItemId, modality: Modality) -> Result<bool> {
        Ok(self.read()?.contains(id, modality))
    }

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        self.read()?.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexConfig;
    use std::thread;

    fn shared(dim: usize) -> SharedIndex {
        SharedIndex::new(VectorIndex::new(IndexConfig::exact(dim)).unwrap())
    }

    #[test]
    fn test_shared_insert_and_search() {
        let index = shared(2);
        index
            .insert("a".into(), Modality::Text, Vector::new(vec![1.0, 0.0]))
            .unwrap();

        let results = index
            .search(&Vector::new(vec![1.0, 0.0]), 1, None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ItemId::from("a"));
    }

    #[test]
    fn test_bulk_insert_atomic_validation() {
        let index = shared(2);
        let result = index.bulk_insert(vec![
            ("a".into(), Modality::Text, Vector::new(vec![1.0, 0.0])),
            ("b".into(), Modality::Text, Vector::new(vec![1.0, 0.0, 0.0])),
        ]);
        assert!(result.is_err());
        // The bad batch was rejected before anything was applied.
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_remove_item_both_modalities() {
        let index = shared(2);
        index
            .insert("a".into(), Modality::Text, Vector::new(vec![1.0, 0.0]))
            .unwrap();
        index
            .insert("a".into(), Modality::Image, Vector::new(vec![0.0, 1.0]))
            .unwrap();
        assert_eq!(index.len().unwrap(), 2);

        index.remove_item(&"a".into()).unwrap();
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        let index = shared(4);
        let mut handles = Vec::new();

        for t in 0..4 {
            let writer = index.clone();
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    let mut values = vec![0.1; 4];
                    values[i % 4] += t as f32 + 1.0;
                    writer
                        .insert(
                            format!("item-{t}-{i}").into(),
                            Modality::Text,
                            Vector::new(values),
                        )
                        .unwrap();
                }
            }));
        }

        for _ in 0..4 {
            let reader = index.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let results = reader
                        .search(&Vector::new(vec![1.0, 0.0, 0.0, 0.0]), 5, None)
                        .unwrap();
                    // Scores stay non-increasing in every observed view.
                    for pair in results.windows(2) {
                        assert!(pair[0].score >= pair[1].score - 1e-6);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(index.len().unwrap(), 100);
    }
}
