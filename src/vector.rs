//! Core types: vectors, modalities, and item identifiers.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of input an embedding was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, stable identifier of a catalog item.
///
/// One item may own at most one vector per modality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An embedding vector in n-dimensional space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume the vector and return its raw values.
    pub fn into_values(self) -> Vec<f32> {
        self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Compute the L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Dot product with another vector. Both vectors must have equal dimension;
    /// for unit-normalized vectors this is the cosine similarity.
    pub fn dot(&self, other: &Vector) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Normalize the vector to unit length
    pub fn normalize(&mut self) -> Result<()> {
        if self.data.iter().any(|x| !x.is_finite()) {
            return Err(SearchError::InvalidVector {
                reason: "Vector contains non-finite values".to_string(),
            });
        }
        let norm = self.norm();
        if norm == 0.0 {
            return Err(SearchError::InvalidVector {
                reason: "Cannot normalize zero vector".to_string(),
            });
        }
        for x in &mut self.data {
            *x /= norm;
        }
        Ok(())
    }

    /// Create a normalized copy of the vector
    pub fn normalized(&self) -> Result<Vector> {
        let mut v = self.clone();
        v.normalize()?;
        Ok(v)
    }

    /// Parse a vector from a comma-separated string
    pub fn from_str(s: &str) -> Result<Self> {
        let data: Result<Vec<f32>> = s
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| SearchError::InvalidVector {
                        reason: format!("Invalid float: {}", x),
                    })
            })
            .collect();
        Ok(Vector::new(data?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vector_creation() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vector_norm() {
        let v = Vector::new(vec![3.0, 4.0]);
        assert_relative_eq!(v.norm(), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_vector_normalize() {
        let mut v = Vector::new(vec![3.0, 4.0]);
        v.normalize().unwrap();
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.as_slice()[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v.as_slice()[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = Vector::new(vec![0.0, 0.0, 0.0]);
        assert!(matches!(
            v.normalize(),
            Err(SearchError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_normalize_nan() {
        let mut v = Vector::new(vec![1.0, f32::NAN]);
        assert!(matches!(
            v.normalize(),
            Err(SearchError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_dot_product() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 6.0]);
        assert_relative_eq!(v1.dot(&v2), 32.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unit_dot_is_cosine() {
        let v1 = Vector::new(vec![1.0, 0.0]).normalized().unwrap();
        let v2 = Vector::new(vec![1.0, 1.0]).normalized().unwrap();
        assert_relative_eq!(v1.dot(&v2), (0.5f32).sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_from_str() {
        let v = Vector::from_str("1.0, 2.0, 3.0").unwrap();
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_item_id_ordering() {
        let a = ItemId::from("A");
        let b = ItemId::from("B");
        assert!(a < b);
        assert_eq!(a.as_str(), "A");
    }

    #[test]
    fn test_modality_display() {
        assert_eq!(Modality::Text.to_string(), "text");
        assert_eq!(Modality::Image.to_string(), "image");
    }
}
