//! Field descriptors and per-field vector buffers.
//!
//! A [`FieldVectorBuffer`] accumulates the vectors of one field for one flush
//! cycle. Ordinals are dense: the n-th vector added has ordinal n, and the
//! documents that carry a value are tracked in a [`DocsWithField`] set.
//! Documents without a value are skipped, never zero-filled.

use std::sync::Arc;

use bit_vec::BitVec;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::vector::similarity::VectorSimilarity;

/// Encoding of vector components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorEncoding {
    /// Signed 8-bit components.
    Byte,
    /// 32-bit floating point components.
    #[default]
    Float32,
}

impl VectorEncoding {
    /// Stable on-disk ordinal.
    pub fn ordinal(&self) -> i32 {
        match self {
            VectorEncoding::Byte => 0,
            VectorEncoding::Float32 => 1,
        }
    }

    /// Resolve an ordinal read from metadata.
    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        match ordinal {
            0 => Ok(VectorEncoding::Byte),
            1 => Ok(VectorEncoding::Float32),
            _ => Err(PilumError::corrupt(format!(
                "invalid vector encoding ordinal: {ordinal}"
            ))),
        }
    }

    /// Get the name of this encoding.
    pub fn name(&self) -> &'static str {
        match self {
            VectorEncoding::Byte => "byte",
            VectorEncoding::Float32 => "float32",
        }
    }
}

impl std::fmt::Display for VectorEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptor of a vector field within a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Field number, unique within the segment and written to metadata.
    pub number: i32,
    /// Component encoding.
    pub encoding: VectorEncoding,
    /// Vector dimension.
    pub dimension: usize,
    /// Similarity function.
    pub similarity: VectorSimilarity,
}

impl FieldInfo {
    /// Create a float32 field descriptor.
    pub fn new(
        name: impl Into<String>,
        number: i32,
        dimension: usize,
        similarity: VectorSimilarity,
    ) -> Self {
        FieldInfo {
            name: name.into(),
            number,
            encoding: VectorEncoding::Float32,
            dimension,
            similarity,
        }
    }

    /// Return a copy with a different encoding.
    pub fn with_encoding(mut self, encoding: VectorEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Set of document ids that have a value, added in increasing order.
#[derive(Debug, Clone, Default)]
pub struct DocsWithField {
    bits: BitVec,
    cardinality: usize,
    last_doc: Option<u32>,
}

impl DocsWithField {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document id; ids must strictly increase.
    pub fn add(&mut self, doc: u32) -> Result<()> {
        if let Some(last) = self.last_doc
            && doc <= last
        {
            return Err(PilumError::invalid_argument(format!(
                "doc ids must be added in increasing order: {doc} after {last}"
            )));
        }
        let index = doc as usize;
        if index >= self.bits.len() {
            self.bits.grow(index + 1 - self.bits.len(), false);
        }
        self.bits.set(index, true);
        self.cardinality += 1;
        self.last_doc = Some(doc);
        Ok(())
    }

    /// Whether `doc` has a value.
    pub fn contains(&self, doc: u32) -> bool {
        self.bits.get(doc as usize).unwrap_or(false)
    }

    /// Number of documents with a value.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Iterate document ids in increasing order; the n-th id has ordinal n.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| *set)
            .map(|(doc, _)| doc as u32)
    }

    /// Approximate heap footprint in bytes.
    pub fn ram_bytes_used(&self) -> usize {
        std::mem::size_of::<Self>() + self.bits.capacity().div_ceil(8)
    }
}

/// Buffered vectors of one field for the current flush cycle.
#[derive(Debug, Clone)]
pub struct FieldVectorBuffer {
    field: FieldInfo,
    vectors: Vec<Vec<f32>>,
    docs: DocsWithField,
}

impl FieldVectorBuffer {
    /// Create an empty buffer for `field`.
    pub fn new(field: FieldInfo) -> Self {
        FieldVectorBuffer {
            field,
            vectors: Vec::new(),
            docs: DocsWithField::new(),
        }
    }

    /// Add the value of document `doc`.
    pub fn add_value(&mut self, doc: u32, vector: &[f32]) -> Result<()> {
        if vector.len() != self.field.dimension {
            return Err(PilumError::DimensionMismatch {
                expected: self.field.dimension,
                actual: vector.len(),
            });
        }
        self.docs.add(doc)?;
        self.vectors.push(vector.to_vec());
        Ok(())
    }

    /// The field this buffer belongs to.
    pub fn field(&self) -> &FieldInfo {
        &self.field
    }

    /// Buffered vectors in ordinal order.
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Documents that have a value.
    pub fn docs_with_field(&self) -> &DocsWithField {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Move the buffered content out, leaving the buffer empty.
    pub fn take(&mut self) -> (Vec<Vec<f32>>, DocsWithField) {
        (
            std::mem::take(&mut self.vectors),
            std::mem::take(&mut self.docs),
        )
    }

    /// Approximate heap footprint in bytes.
    pub fn ram_bytes_used(&self) -> usize {
        let per_vector = std::mem::size_of::<Vec<f32>>() + self.field.dimension * 4;
        std::mem::size_of::<Self>()
            + self.vectors.capacity() * std::mem::size_of::<Vec<f32>>()
            + self.vectors.len() * (per_vector - std::mem::size_of::<Vec<f32>>())
            + self.docs.ram_bytes_used()
    }
}

/// A field buffer shared between the writer and the flat vectors delegate.
pub type SharedFieldBuffer = Arc<Mutex<FieldVectorBuffer>>;

/// Per-document sink returned when a field is registered.
///
/// The caller feeds one document at a time, in increasing doc id order.
#[derive(Debug, Clone)]
pub struct FieldVectorSink {
    buffer: SharedFieldBuffer,
}

impl FieldVectorSink {
    pub(crate) fn new(buffer: SharedFieldBuffer) -> Self {
        FieldVectorSink { buffer }
    }

    /// Add the vector of document `doc`.
    pub fn add_value(&self, doc: u32, vector: &[f32]) -> Result<()> {
        self.buffer.lock().add_value(doc, vector)
    }

    /// Number of vectors buffered so far in this flush cycle.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registered field.
    pub fn field(&self) -> FieldInfo {
        self.buffer.lock().field().clone()
    }
}
