//! Embedding provider boundary.
//!
//! The engine never runs a model itself; it depends on an
//! [`EmbeddingProvider`] that turns text or image bytes into vectors of the
//! index's configured dimensionality. Text and image vectors are assumed to
//! live in one shared embedding space — that semantic alignment is the
//! provider's guarantee, the engine only enforces dimensional consistency.

use crate::error::{Result, SearchError};
use crate::vector::{Modality, Vector};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// External capability that embeds raw queries and catalog content.
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of every vector this provider produces. Must match
    /// the index at engine construction.
    fn dimensions(&self) -> usize;

    /// Embed a text string. Empty input is an embedding failure.
    fn embed_text(&self, text: &str) -> Result<Vector>;

    /// Embed a raw image buffer. Empty input is an embedding failure.
    fn embed_image(&self, image: &[u8]) -> Result<Vector>;
}

/// Deterministic synthetic provider based on feature hashing.
///
/// Used by the CLI demo, tests, and benches so the engine runs without a
/// real model. Tokens of lowercase text (and folded image bytes) hash into
/// dimension buckets; identical input always embeds identically. There is
/// no semantic alignment between the modalities.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(SearchError::ConfigurationError {
                reason: "Embedder dimensionality must be at least 1".to_string(),
            });
        }
        Ok(Self { dimensions })
    }

    fn bucket_of(&self, token: &str, salt: u64) -> usize {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimensions
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_text(&self, text: &str) -> Result<Vector> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(SearchError::EmbeddingFailure {
                modality: Modality::Text,
                reason: "Empty text".to_string(),
            });
        }

        let mut values = vec![0.0f32; self.dimensions];
        for token in tokens {
            // Two buckets per token for spread at small dimensionalities.
            values[self.bucket_of(token, 0)] += 1.0;
            values[self.bucket_of(token, 1)] += 0.5;
        }
        Ok(Vector::new(values))
    }

    fn embed_image(&self, image: &[u8]) -> Result<Vector> {
        if image.is_empty() {
            return Err(SearchError::EmbeddingFailure {
                modality: Modality::Image,
                reason: "Empty image buffer".to_string(),
            });
        }

        let mut values = vec![0.0f32; self.dimensions];
        for (i, &byte) in image.iter().enumerate() {
            values[(i + byte as usize) % self.dimensions] += byte as f32 / 255.0;
        }
        // Length component keeps all-zero buffers embeddable.
        values[image.len() % self.dimensions] += 1.0;
        Ok(Vector::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_enforced() {
        assert!(HashEmbedder::new(0).is_err());
        let embedder = HashEmbedder::new(16).unwrap();
        assert_eq!(embedder.dimensions(), 16);
        assert_eq!(embedder.embed_text("red shoe").unwrap().dimension(), 16);
        assert_eq!(embedder.embed_image(&[1, 2, 3]).unwrap().dimension(), 16);
    }

    #[test]
    fn test_text_deterministic() {
        let embedder = HashEmbedder::new(32).unwrap();
        let a = embedder.embed_text("leather wallet brown").unwrap();
        let b = embedder.embed_text("leather wallet brown").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_case_insensitive() {
        let embedder = HashEmbedder::new(32).unwrap();
        let a = embedder.embed_text("Red Shoe").unwrap();
        let b = embedder.embed_text("red shoe").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_text_fails() {
        let embedder = HashEmbedder::new(8).unwrap();
        assert!(matches!(
            embedder.embed_text("   "),
            Err(SearchError::EmbeddingFailure {
                modality: Modality::Text,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_image_fails() {
        let embedder = HashEmbedder::new(8).unwrap();
        assert!(matches!(
            embedder.embed_image(&[]),
            Err(SearchError::EmbeddingFailure {
                modality: Modality::Image,
                ..
            })
        ));
    }

    #[test]
    fn test_image_nonzero() {
        let embedder = HashEmbedder::new(8).unwrap();
        let v = embedder.embed_image(&[0, 0, 0, 0]).unwrap();
        assert!(v.norm() > 0.0);
    }

    #[test]
    fn test_similar_text_shares_buckets() {
        let embedder = HashEmbedder::new(64).unwrap();
        let a = embedder
            .embed_text("blue running shoe")
            .unwrap()
            .normalized()
            .unwrap();
        let b = embedder
            .embed_text("red running shoe")
            .unwrap()
            .normalized()
            .unwrap();
        let c = embedder
            .embed_text("walnut coffee table")
            .unwrap()
            .normalized()
            .unwrap();
        assert!(a.dot(&b) > a.dot(&c));
    }
}
