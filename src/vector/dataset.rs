//! Contiguous, ordinal-indexed vector datasets handed to index builds.
//!
//! A [`Dataset`] is built once per field per flush or merge and is immutable
//! afterwards. Vectors are stored row-major in one allocation so that index
//! libraries can consume them without further copying.

use crate::error::{PilumError, Result};
use crate::vector::field::DocsWithField;
use crate::vector::merge::FloatVectorValues;
use crate::vector::sort::{DocMap, map_old_ord_to_new_ord};

/// An immutable row-major matrix of `size` vectors of `dimension` floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dimension: usize,
    size: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// An empty dataset of the given dimension.
    pub fn empty(dimension: usize) -> Self {
        Dataset {
            dimension,
            size: 0,
            data: Vec::new(),
        }
    }

    /// Copy buffered vectors in ordinal order.
    pub fn from_vectors(vectors: &[Vec<f32>], dimension: usize) -> Result<Self> {
        let mut builder = DatasetBuilder::with_capacity(dimension, vectors.len());
        for vector in vectors {
            builder.add_vector(vector)?;
        }
        Ok(builder.build())
    }

    /// Copy buffered vectors in the ordinal order imposed by `sort_map`.
    ///
    /// Position `i` of the result holds `vectors[new_to_old_ord[i]]`.
    pub fn from_sorted_vectors(
        vectors: &[Vec<f32>],
        docs: &DocsWithField,
        dimension: usize,
        sort_map: &dyn DocMap,
    ) -> Result<Self> {
        debug_assert_eq!(vectors.len(), docs.cardinality());
        let mapping = map_old_ord_to_new_ord(docs, sort_map)?;

        let mut builder = DatasetBuilder::with_capacity(dimension, vectors.len());
        for &old_ord in &mapping.new_to_old_ord {
            let vector = vectors.get(old_ord).ok_or_else(|| {
                PilumError::internal(format!(
                    "ordinal {old_ord} out of range for {} vectors",
                    vectors.len()
                ))
            })?;
            builder.add_vector(vector)?;
        }
        Ok(builder.build())
    }

    /// Drain merged vector values into a new dataset.
    ///
    /// The dataset is sized by the number of documents that actually carried a
    /// value, which may be smaller than `values.size()`.
    pub fn from_vector_values(values: &mut dyn FloatVectorValues) -> Result<Self> {
        let mut builder = DatasetBuilder::with_capacity(values.dimension(), values.size());
        let mut docs = DocsWithField::new();
        while let Some((doc, vector)) = values.next_vector()? {
            builder.add_vector(vector)?;
            docs.add(doc)?;
        }
        debug_assert_eq!(builder.len(), docs.cardinality());
        Ok(builder.build())
    }

    /// Number of vectors.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The vector with ordinal `ord`.
    pub fn vector(&self, ord: usize) -> Option<&[f32]> {
        if ord >= self.size {
            return None;
        }
        let start = ord * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Iterate vectors in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on zero; a zero-dimension dataset yields nothing.
        let dimension = self.dimension.max(1);
        self.data.chunks_exact(dimension).take(self.size)
    }

    /// The raw row-major data.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Incremental builder for a [`Dataset`].
#[derive(Debug)]
pub struct DatasetBuilder {
    dimension: usize,
    data: Vec<f32>,
    size: usize,
}

impl DatasetBuilder {
    pub fn new(dimension: usize) -> Self {
        Self::with_capacity(dimension, 0)
    }

    /// Preallocate room for `capacity` vectors.
    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        DatasetBuilder {
            dimension,
            data: Vec::with_capacity(dimension * capacity),
            size: 0,
        }
    }

    /// Append a vector; its length must equal the dimension.
    pub fn add_vector(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(PilumError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        self.size += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn build(self) -> Dataset {
        Dataset {
            dimension: self.dimension,
            size: self.size,
            data: self.data,
        }
    }
}
