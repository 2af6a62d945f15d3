//! Ranking: turns scored candidates into an ordered result list, with
//! weighted score fusion for queries that span both modalities.

use crate::error::{Result, SearchError};
use crate::index::{sort_candidates, ScoredCandidate};
use crate::vector::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many candidates to fetch per modality ahead of fusion, as a
/// multiple of k. Fusing too few can drop an item that ranks low in one
/// modality but wins after combining.
pub const DEFAULT_OVERFETCH_FACTOR: usize = 4;

/// Relative weights for combining per-modality scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityWeights {
    pub text: f32,
    pub image: f32,
}

impl Default for ModalityWeights {
    fn default() -> Self {
        Self {
            text: 0.5,
            image: 0.5,
        }
    }
}

impl ModalityWeights {
    pub fn new(text: f32, image: f32) -> Result<Self> {
        let weights = Self { text, image };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.text.is_finite() || !self.image.is_finite() || self.text < 0.0 || self.image < 0.0
        {
            return Err(SearchError::InvalidArgument {
                reason: "Modality weights must be finite and non-negative".to_string(),
            });
        }
        if self.text == 0.0 && self.image == 0.0 {
            return Err(SearchError::InvalidArgument {
                reason: "At least one modality weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// One entry of the final ordered result list. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: ItemId,
    pub score: f32,
    pub rank: usize,
}

/// Order candidates, truncate to `k`, and label ranks 1..=k.
pub fn rank(mut candidates: Vec<ScoredCandidate>, k: usize) -> Vec<RankedResult> {
    sort_candidates(&mut candidates);
    candidates.truncate(k);
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| RankedResult {
            id: c.id,
            score: c.score,
            rank: i + 1,
        })
        .collect()
}

/// Fuse per-modality candidate sets by weighted sum and rank the result.
///
/// `combined = w_text * score_text + w_image * score_image`; an item seen
/// in only one set contributes 0 from the missing side rather than being
/// penalized. A zero-weighted modality is excluded outright, so weights
/// (1, 0) reproduce a pure text search and (0, 1) a pure image search.
/// `k` is enforced after fusion.
pub fn fuse(
    text_candidates: Vec<ScoredCandidate>,
    image_candidates: Vec<ScoredCandidate>,
    weights: ModalityWeights,
    k: usize,
) -> Result<Vec<RankedResult>> {
    weights.validate()?;

    let mut combined: HashMap<ItemId, f32> = HashMap::new();
    if weights.text > 0.0 {
        for c in text_candidates {
            *combined.entry(c.id).or_insert(0.0) += weights.text * c.score;
        }
    }
    if weights.image > 0.0 {
        for c in image_candidates {
            *combined.entry(c.id).or_insert(0.0) += weights.image * c.score;
        }
    }

    let fused: Vec<ScoredCandidate> = combined
        .into_iter()
        .map(|(id, score)| ScoredCandidate { id, score })
        .collect();
    Ok(rank(fused, k))
}
