//! HNSW approximate search strategy.
//!
//! Hierarchical Navigable Small World graph per Malkov & Yashunin
//! (2016/2018), built over cosine distance (`1 - dot`) on the index's
//! unit-normalized vectors. Approximation quality is validated against
//! the exact strategy by recall tests.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{EntryKey, ScoredCandidate, SearchStrategy};
use crate::error::{Result, SearchError};
use crate::vector::{Modality, Vector};

/// Configuration parameters for the HNSW graph.
#[derive(Debug, Clone)]
pub struct HnswParams {
    /// Max number of connections per node (layers > 0).
    pub m: usize,
    /// Max connections at layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Number of candidates during construction.
    pub ef_construction: usize,
    /// Number of candidates during search.
    pub ef_search: usize,
    /// Level generation factor: 1 / ln(m).
    pub ml: f64,
    /// Maximum number of layers.
    pub max_layers: usize,
    /// Seed for level generation, so repeated builds over the same
    /// insertion order produce the same graph.
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        let m = 16;
        Self {
            m,
            m_max0: 2 * m,
            ef_construction: 200,
            ef_search: 50,
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
            seed: 42,
        }
    }
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        Self {
            m,
            m_max0: 2 * m,
            ef_construction,
            ef_search,
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A graph neighbor during traversal: slot plus cosine distance.
#[derive(Debug, Clone, Copy)]
struct Neighbor {
    distance: f32,
    slot: usize,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.slot == other.slot
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap by distance: furthest on top.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

#[derive(Debug, Clone)]
struct Node {
    key: EntryKey,
    vector: Vector,
    /// Neighbor slots per layer.
    neighbors: Vec<Vec<usize>>,
    /// The highest layer this node was inserted into.
    level: usize,
}

/// HNSW-backed approximate strategy behind the shared search contract.
#[derive(Debug)]
pub struct HnswStrategy {
    /// Nodes addressed by slot; deleted slots become None.
    nodes: Vec<Option<Node>>,
    /// Entry point slot (highest-level node).
    entry_point: Option<usize>,
    max_level: usize,
    params: HnswParams,
    rng: StdRng,
    count: usize,
}

impl HnswStrategy {
    pub fn new(params: HnswParams) -> Self {
        let rng = StdRng::seed_from_u64(params.seed);
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            params,
            rng,
            count: 0,
        }
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen();
        let level = (-r.ln() * self.params.ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    /// Cosine distance between the query and a stored node. Both sides
    /// are unit vectors, so this is `1 - dot`.
    fn distance(&self, query: &Vector, slot: usize) -> Result<f32> {
        let node = self.nodes[slot]
            .as_ref()
            .ok_or_else(|| SearchError::IndexError("Graph node missing".to_string()))?;
        Ok(1.0 - query.dot(&node.vector))
    }

    /// Greedy beam search of one layer for the `ef` closest neighbors,
    /// starting from the entry slots `ep`.
    fn search_layer(
        &self,
        query: &Vector,
        ep: &[usize],
        ef: usize,
        layer: usize,
    ) -> Result<Vec<Neighbor>> {
        let mut visited = HashSet::new();
        // Min-heap of candidates to expand; max-heap of current results.
        let mut candidates: BinaryHeap<std::cmp::Reverse<Neighbor>> = BinaryHeap::new();
        let mut results: BinaryHeap<Neighbor> = BinaryHeap::new();

        for &ep_slot in ep {
            let distance = self.distance(query, ep_slot)?;
            visited.insert(ep_slot);
            let neighbor = Neighbor {
                distance,
                slot: ep_slot,
            };
            candidates.push(std::cmp::Reverse(neighbor));
            results.push(neighbor);
        }

        while let Some(std::cmp::Reverse(closest)) = candidates.pop() {
            let furthest = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
            if closest.distance > furthest {
                break;
            }

            if let Some(node) = &self.nodes[closest.slot] {
                if layer < node.neighbors.len() {
                    for &neighbor_slot in &node.neighbors[layer] {
                        if !visited.insert(neighbor_slot) {
                            continue;
                        }
                        // Skip slots emptied by deletion.
                        if self
                            .nodes
                            .get(neighbor_slot)
                            .and_then(|n| n.as_ref())
                            .is_none()
                        {
                            continue;
                        }

                        let distance = self.distance(query, neighbor_slot)?;
                        let furthest = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);

                        if distance < furthest || results.len() < ef {
                            let neighbor = Neighbor {
                                distance,
                                slot: neighbor_slot,
                            };
                            candidates.push(std::cmp::Reverse(neighbor));
                            results.push(neighbor);
                            if results.len() > ef {
                                results.pop();
                            }
                        }
                    }
                }
            }
        }

        let mut sorted: Vec<Neighbor> = results.into_vec();
        sorted.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
        });
        Ok(sorted)
    }

    /// Prune a node's neighbor list at a layer down to its `m` closest.
    fn prune_neighbors(&mut self, slot: usize, layer: usize, m: usize) {
        let (neighbor_slots, node_vec) = {
            let node = match &self.nodes[slot] {
                Some(n) => n,
                None => return,
            };
            if layer >= node.neighbors.len() {
                return;
            }
            (node.neighbors[layer].clone(), node.vector.clone())
        };

        let mut scored: Vec<(usize, f32)> = neighbor_slots
            .into_iter()
            .filter_map(|ns| {
                self.nodes
                    .get(ns)
                    .and_then(|n| n.as_ref())
                    .map(|n| (ns, 1.0 - node_vec.dot(&n.vector)))
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(m);

        if let Some(node) = &mut self.nodes[slot] {
            if layer < node.neighbors.len() {
                node.neighbors[layer] = scored.into_iter().map(|(ns, _)| ns).collect();
            }
        }
    }

    fn insert(&mut self, slot: usize, key: EntryKey, vector: Vector) -> Result<()> {
        let level = self.random_level();

        if slot >= self.nodes.len() {
            self.nodes.resize_with(slot + 1, || None);
        }
        self.nodes[slot] = Some(Node {
            key,
            vector: vector.clone(),
            neighbors: vec![Vec::new(); level + 1],
            level,
        });
        self.count += 1;

        let entry_point = match self.entry_point {
            None => {
                self.entry_point = Some(slot);
                self.max_level = level;
                return Ok(());
            }
            Some(ep) => ep,
        };

        let mut ep_slot = entry_point;
        let current_max_level = self.max_level;

        // Greedy descent from the top layer down to level+1 with ef=1.
        if current_max_level > level {
            for l in (level + 1..=current_max_level).rev() {
                let nearest = self.search_layer(&vector, &[ep_slot], 1, l)?;
                if let Some(n) = nearest.first() {
                    ep_slot = n.slot;
                }
            }
        }

        // Connect at layers min(level, current_max_level) down to 0.
        let insert_from = level.min(current_max_level);
        for l in (0..=insert_from).rev() {
            let m = if l == 0 {
                self.params.m_max0
            } else {
                self.params.m
            };

            let nearest =
                self.search_layer(&vector, &[ep_slot], self.params.ef_construction, l)?;
            let neighbors: Vec<usize> =
                nearest.iter().take(m).map(|n| n.slot).collect();

            if let Some(node) = &mut self.nodes[slot] {
                if l < node.neighbors.len() {
                    node.neighbors[l] = neighbors.clone();
                }
            }

            // Bidirectional links; prune any neighbor that goes over capacity.
            for &neighbor_slot in &neighbors {
                let needs_pruning = if let Some(neighbor) = &mut self.nodes[neighbor_slot] {
                    if l < neighbor.neighbors.len() {
                        neighbor.neighbors[l].push(slot);
                        neighbor.neighbors[l].len() > m
                    } else {
                        false
                    }
                } else {
                    false
                };
                if needs_pruning {
                    self.prune_neighbors(neighbor_slot, l, m);
                }
            }

            if let Some(n) = nearest.first() {
                ep_slot = n.slot;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(slot);
            self.max_level = level;
        }

        Ok(())
    }

    fn search_knn(
        &self,
        query: &Vector,
        k: usize,
        filter: Option<Modality>,
    ) -> Result<Vec<ScoredCandidate>> {
        let entry_point = match self.entry_point {
            Some(ep) => ep,
            None => return Ok(vec![]),
        };

        let mut ep_slot = entry_point;
        for l in (1..=self.max_level).rev() {
            let nearest = self.search_layer(query, &[ep_slot], 1, l)?;
            if let Some(n) = nearest.first() {
                ep_slot = n.slot;
            }
        }

        // Over-provision ef when filtering, so the modality filter still
        // leaves enough survivors to fill k.
        let mut ef = self.params.ef_search.max(k);
        if filter.is_some() {
            ef *= 4;
        }
        let neighbors = self.search_layer(query, &[ep_slot], ef, 0)?;

        let mut out = Vec::with_capacity(k);
        for n in neighbors {
            let node = match self.nodes.get(n.slot).and_then(|n| n.as_ref()) {
                Some(node) => node,
                None => continue,
            };
            if let Some(modality) = filter {
                if node.key.modality != modality {
                    continue;
                }
            }
            out.push(ScoredCandidate {
                id: node.key.id.clone(),
                score: 1.0 - n.distance,
            });
            if out.len() == k {
                break;
            }
        }
        Ok(out)
    }
}

impl SearchStrategy for HnswStrategy {
    fn add(&mut self, slot: usize, key: EntryKey, vector: Vector) -> Result<()> {
        self.insert(slot, key, vector)
    }

    fn remove(&mut self, slot: usize) -> Result<()> {
        if slot >= self.nodes.len() || self.nodes[slot].is_none() {
            return Ok(());
        }

        if let Some(node) = self.nodes[slot].take() {
            for (layer, neighbors) in node.neighbors.iter().enumerate() {
                for &neighbor_slot in neighbors {
                    if let Some(Some(neighbor)) = self.nodes.get_mut(neighbor_slot) {
                        if layer < neighbor.neighbors.len() {
                            neighbor.neighbors[layer].retain(|&s| s != slot);
                        }
                    }
                }
            }
            self.count -= 1;

            if self.entry_point == Some(slot) {
                self.entry_point = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter_map(|(i, n)| n.as_ref().map(|n| (i, n.level)))
                    .max_by_key(|&(_, level)| level)
                    .map(|(i, _)| i);

                self.max_level = self
                    .entry_point
                    .and_then(|ep| self.nodes[ep].as_ref().map(|n| n.level))
                    .unwrap_or(0);
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
        self.search_knn(query, k, filter)
    }

    fn entry(&self, slot: usize) -> Option<(&EntryKey, &Vector)> {
        self.nodes
            .get(slot)
            .and_then(|n| n.as_ref())
            .map(|n| (&n.key, &n.vector))
    }

    fn len(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ItemId;

    fn key(id: &str) -> EntryKey {
        EntryKey::new(ItemId::from(id), Modality::Text)
    }

    fn unit(values: Vec<f32>) -> Vector {
        Vector::new(values).normalized().unwrap()
    }

    fn small_params() -> HnswParams {
        HnswParams::new(4, 32, 16)
    }

    #[test]
    fn test_insert_single() {
        let mut graph = HnswStrategy::new(small_params());
        graph
            .add(0, key("a"), unit(vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.entry_point.is_some());
    }

    #[test]
    fn test_self_search() {
        let mut graph = HnswStrategy::new(small_params());
        let vectors: Vec<Vector> = (0..100)
            .map(|i| {
                unit(vec![
                    (i as f32) * 0.1 + 0.01,
                    ((i * 7) as f32) * 0.1 + 0.01,
                    ((i * 13) as f32) * 0.1 + 0.01,
                ])
            })
            .collect();

        for (i, v) in vectors.iter().enumerate() {
            graph.add(i, key(&format!("item-{i:03}")), v.clone()).unwrap();
        }

        for (i, v) in vectors.iter().enumerate() {
            let results = graph.search(v, 1, None).unwrap();
            assert!(!results.is_empty(), "No results for vector {}", i);
            assert!(
                results[0].score > 1.0 - 1e-5,
                "Self-search for {} returned score {}",
                i,
                results[0].score
            );
        }
    }

    #[test]
    fn test_search_returns_nearest() {
        let mut graph = HnswStrategy::new(small_params());
        graph.add(0, key("a"), unit(vec![1.0, 0.0])).unwrap();
        graph.add(1, key("b"), unit(vec![0.0, 1.0])).unwrap();
        graph.add(2, key("c"), unit(vec![1.0, 1.0])).unwrap();

        let results = graph.search(&unit(vec![1.0, 0.1]), 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, ItemId::from("a"));
    }

    #[test]
    fn test_modality_filter() {
        let mut graph = HnswStrategy::new(small_params());
        graph
            .add(0, EntryKey::new("a".into(), Modality::Text), unit(vec![1.0, 0.0]))
            .unwrap();
        graph
            .add(1, EntryKey::new("b".into(), Modality::Image), unit(vec![1.0, 0.1]))
            .unwrap();

        let results = graph
            .search(&unit(vec![1.0, 0.0]), 5, Some(Modality::Image))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ItemId::from("b"));
    }

    #[test]
    fn test_remove() {
        let mut graph = HnswStrategy::new(small_params());
        graph.add(0, key("a"), unit(vec![1.0, 0.0])).unwrap();
        graph.add(1, key("b"), unit(vec![0.0, 1.0])).unwrap();
        assert_eq!(graph.len(), 2);

        graph.remove(0).unwrap();
        assert_eq!(graph.len(), 1);

        let results = graph.search(&unit(vec![0.0, 1.0]), 1, None).unwrap();
        assert_eq!(results[0].id, ItemId::from("b"));
    }

    #[test]
    fn test_remove_entry_point() {
        let mut graph = HnswStrategy::new(small_params());
        graph.add(0, key("a"), unit(vec![1.0, 0.0])).unwrap();
        graph.add(1, key("b"), unit(vec![0.0, 1.0])).unwrap();
        graph.add(2, key("c"), unit(vec![1.0, 1.0])).unwrap();

        let ep = graph.entry_point.unwrap();
        graph.remove(ep).unwrap();
        assert_eq!(graph.len(), 2);

        let results = graph.search(&unit(vec![0.0, 1.0]), 1, None).unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn test_seeded_builds_match() {
        let build = || {
            let mut graph = HnswStrategy::new(small_params().with_seed(7));
            for i in 0..50 {
                let v = unit(vec![(i as f32 + 1.0), ((i * 3) % 17) as f32 + 1.0]);
                graph.add(i, key(&format!("item-{i:02}")), v).unwrap();
            }
            graph
        };

        let a = build();
        let b = build();
        let query = unit(vec![3.0, 5.0]);
        let ra = a.search(&query, 5, None).unwrap();
        let rb = b.search(&query, 5, None).unwrap();
        assert_eq!(ra, rb);
    }
}
