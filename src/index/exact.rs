//! Exact (exhaustive) search strategy — the correctness baseline.

use super::top_k::TopK;
use super::{EntryKey, ScoredCandidate, SearchStrategy};
use crate::error::Result;
use crate::vector::{Modality, Vector};
use rayon::prelude::*;

/// Catalogs at or above this size are scored in parallel.
const PARALLEL_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
struct StoredEntry {
    key: EntryKey,
    vector: Vector,
}

/// Scores every stored vector against the query by dot product and keeps
/// the top k in a bounded heap, O(N log k) per search.
#[derive(Debug)]
pub struct ExactStrategy {
    /// Slot-addressed storage; removed slots become None.
    entries: Vec<Option<StoredEntry>>,
    count: usize,
}

impl ExactStrategy {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            count: 0,
        }
    }

    fn score(entry: &StoredEntry, query: &Vector, filter: Option<Modality>) -> Option<ScoredCandidate> {
        if let Some(modality) = filter {
            if entry.key.modality != modality {
                return None;
            }
        }
        Some(ScoredCandidate {
            id: entry.key.id.clone(),
            score: query.dot(&entry.vector),
        })
    }
}

impl Default for ExactStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for ExactStrategy {
    fn add(&mut self, slot: usize, key: EntryKey, vector: Vector) -> Result<()> {
        if slot >= self.entries.len() {
            self.entries.resize_with(slot + 1, || None);
        }
        if self.entries[slot].is_none() {
            self.count += 1;
        }
        self.entries[slot] = Some(StoredEntry { key, vector });
        Ok(())
    }

    fn remove(&mut self, slot: usize) -> Result<()> {
        if let Some(entry) = self.entries.get_mut(slot) {
            if entry.take().is_some() {
                self.count -= 1;
            }
        }
        Ok(())
    }

    fn search(
        &self,
        query: &Vector,
        k: usize,
        filter: Option<Modality>,
    ) -> Result<Vec<ScoredCandidate>> {
        let top = if self.count >= PARALLEL_THRESHOLD {
            self.entries
                .par_iter()
                .flatten()
                .filter_map(|entry| Self::score(entry, query, filter))
                .fold(
                    || TopK::new(k),
                    |mut acc, candidate| {
                        acc.push(candidate);
                        acc
                    },
                )
                .reduce(|| TopK::new(k), TopK::merge)
        } else {
            let mut acc = TopK::new(k);
            for candidate in self
                .entries
                .iter()
                .flatten()
                .filter_map(|entry| Self::score(entry, query, filter))
            {
                acc.push(candidate);
            }
            acc
        };
        Ok(top.into_sorted())
    }

    fn entry(&self, slot: usize) -> Option<(&EntryKey, &Vector)> {
        self.entries
            .get(slot)
            .and_then(|e| e.as_ref())
            .map(|e| (&e.key, &e.vector))
    }

    fn len(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ItemId;
    use approx::assert_relative_eq;

    fn key(id: &str, modality: Modality) -> EntryKey {
        EntryKey::new(ItemId::from(id), modality)
    }

    fn unit(values: Vec<f32>) -> Vector {
        Vector::new(values).normalized().unwrap()
    }

    #[test]
    fn test_basic_search() {
        let mut strategy = ExactStrategy::new();
        strategy
            .add(0, key("a", Modality::Text), unit(vec![1.0, 0.0]))
            .unwrap();
        strategy
            .add(1, key("b", Modality::Text), unit(vec![0.0, 1.0]))
            .unwrap();
        strategy
            .add(2, key("c", Modality::Text), unit(vec![1.0, 1.0]))
            .unwrap();

        let results = strategy
            .search(&unit(vec![1.0, 0.0]), 2, None)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, ItemId::from("a"));
        assert_relative_eq!(results[0].score, 1.0, epsilon = 1e-6);
        assert_eq!(results[1].id, ItemId::from("c"));
    }

    #[test]
    fn test_modality_filter() {
        let mut strategy = ExactStrategy::new();
        strategy
            .add(0, key("a", Modality::Text), unit(vec![1.0, 0.0]))
            .unwrap();
        strategy
            .add(1, key("b", Modality::Image), unit(vec![1.0, 0.0]))
            .unwrap();

        let results = strategy
            .search(&unit(vec![1.0, 0.0]), 10, Some(Modality::Image))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ItemId::from("b"));
    }

    #[test]
    fn test_remove_slot() {
        let mut strategy = ExactStrategy::new();
        strategy
            .add(0, key("a", Modality::Text), unit(vec![1.0, 0.0]))
            .unwrap();
        strategy
            .add(1, key("b", Modality::Text), unit(vec![0.0, 1.0]))
            .unwrap();
        assert_eq!(strategy.len(), 2);

        strategy.remove(0).unwrap();
        assert_eq!(strategy.len(), 1);
        assert!(strategy.entry(0).is_none());

        // Removing an already-removed slot stays a no-op.
        strategy.remove(0).unwrap();
        assert_eq!(strategy.len(), 1);
    }

    #[test]
    fn test_entry_lookup() {
        let mut strategy = ExactStrategy::new();
        let v = unit(vec![3.0, 4.0]);
        strategy.add(5, key("a", Modality::Image), v.clone()).unwrap();

        let (k, stored) = strategy.entry(5).unwrap();
        assert_eq!(k.id, ItemId::from("a"));
        assert_eq!(stored, &v);
        assert!(strategy.entry(99).is_none());
    }
}
