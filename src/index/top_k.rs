//! Bounded top-k selection over f32 similarity scores.
//!
//! Keeps the k best-scoring candidates in a binary heap ordered worst-first,
//! so each push is O(log k) and a full scan stays O(N log k) without sorting
//! every candidate.

use super::{ScoredCandidate, SCORE_EPSILON};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap wrapper that orders candidates worst-first: lower score is greater,
/// and among (near-)equal scores the larger item id is greater, so it is
/// evicted first and ascending-id tie order survives truncation.
#[derive(Debug)]
struct WorstFirst(ScoredCandidate);

impl PartialEq for WorstFirst {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WorstFirst {}

impl PartialOrd for WorstFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorstFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        if (self.0.score - other.0.score).abs() <= SCORE_EPSILON {
            self.0.id.cmp(&other.0.id)
        } else {
            other.0.score.total_cmp(&self.0.score)
        }
    }
}

/// A bounded collector of the k best candidates seen so far.
#[derive(Debug)]
pub struct TopK {
    heap: BinaryHeap<WorstFirst>,
    capacity: usize,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Offer a candidate; the worst entry is evicted once over capacity.
    pub fn push(&mut self, candidate: ScoredCandidate) {
        self.heap.push(WorstFirst(candidate));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Merge two collectors of the same capacity (rayon reduce step).
    pub fn merge(mut self, other: TopK) -> TopK {
        for entry in other.heap {
            self.push(entry.0);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a Vec ordered best-first (descending score, ascending id
    /// on ties).
    pub fn into_sorted(self) -> Vec<ScoredCandidate> {
        let mut candidates: Vec<ScoredCandidate> =
            self.heap.into_iter().map(|w| w.0).collect();
        super::sort_candidates(&mut candidates);
        candidates
    }
}
