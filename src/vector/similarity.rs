//! Vector similarity functions and their stable on-disk ordinals.

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};

/// Similarity function of a vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorSimilarity {
    /// Euclidean (L2) distance
    #[default]
    Euclidean,
    /// Dot product of unit-length vectors
    DotProduct,
    /// Cosine similarity
    Cosine,
    /// Unbounded inner product
    MaximumInnerProduct,
}

/// Supported similarity functions in on-disk ordinal order.
///
/// Metadata rows store a position in this list. Entries may only be appended.
pub const SIMILARITY_FUNCTIONS: [VectorSimilarity; 4] = [
    VectorSimilarity::Euclidean,
    VectorSimilarity::DotProduct,
    VectorSimilarity::Cosine,
    VectorSimilarity::MaximumInnerProduct,
];

impl VectorSimilarity {
    /// Position of this function in [`SIMILARITY_FUNCTIONS`].
    pub fn ordinal(&self) -> i32 {
        match self {
            VectorSimilarity::Euclidean => 0,
            VectorSimilarity::DotProduct => 1,
            VectorSimilarity::Cosine => 2,
            VectorSimilarity::MaximumInnerProduct => 3,
        }
    }

    /// Resolve an ordinal read from metadata.
    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| SIMILARITY_FUNCTIONS.get(i).copied())
            .ok_or_else(|| PilumError::corrupt(format!("invalid similarity ordinal: {ordinal}")))
    }

    /// Distance between two vectors; lower is closer.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(PilumError::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }

        let result = match self {
            VectorSimilarity::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>(),
            VectorSimilarity::DotProduct | VectorSimilarity::MaximumInnerProduct => {
                -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
            }
            VectorSimilarity::Cosine => {
                let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    1.0 - (dot_product / (norm_a * norm_b))
                }
            }
        };

        Ok(result)
    }

    /// Get the name of this similarity function.
    pub fn name(&self) -> &'static str {
        match self {
            VectorSimilarity::Euclidean => "euclidean",
            VectorSimilarity::DotProduct => "dot_product",
            VectorSimilarity::Cosine => "cosine",
            VectorSimilarity::MaximumInnerProduct => "maximum_inner_product",
        }
    }

    /// Parse a similarity function from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(VectorSimilarity::Euclidean),
            "dot_product" | "dot" => Ok(VectorSimilarity::DotProduct),
            "cosine" => Ok(VectorSimilarity::Cosine),
            "maximum_inner_product" | "mip" => Ok(VectorSimilarity::MaximumInnerProduct),
            _ => Err(PilumError::invalid_argument(format!(
                "Unknown similarity function: {s}"
            ))),
        }
    }
}

impl std::fmt::Display for VectorSimilarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
