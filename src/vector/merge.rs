//! Merge-time access to the vectors of the segments being merged.
//!
//! The host engine exposes each source segment through a
//! [`SegmentVectorsReader`] and a doc map that sends segment-local doc ids to
//! merged ids (`None` for deleted documents). [`MergedVectorValues`] presents
//! all live values of one field as a single stream ordered by merged doc id.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::error::{PilumError, Result};
use crate::vector::field::{FieldInfo, VectorEncoding};

/// Forward-only iterator over the float vectors of one field.
pub trait FloatVectorValues: Send + std::fmt::Debug {
    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Upper bound on the number of vectors the iterator yields.
    fn size(&self) -> usize;

    /// Advance to the next document with a value, in increasing doc id order.
    fn next_vector(&mut self) -> Result<Option<(u32, &[f32])>>;
}

/// A [`FloatVectorValues`] over vectors held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryVectorValues {
    dimension: usize,
    entries: Vec<(u32, Vec<f32>)>,
    cursor: usize,
}

impl InMemoryVectorValues {
    /// Wrap `(doc, vector)` pairs sorted by strictly increasing doc id.
    pub fn new(dimension: usize, entries: Vec<(u32, Vec<f32>)>) -> Result<Self> {
        for pair in entries.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(PilumError::invalid_argument(format!(
                    "doc ids must be increasing: {} after {}",
                    pair[1].0, pair[0].0
                )));
            }
        }
        if let Some((_, vector)) = entries.iter().find(|(_, v)| v.len() != dimension) {
            return Err(PilumError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        Ok(InMemoryVectorValues {
            dimension,
            entries,
            cursor: 0,
        })
    }
}

impl FloatVectorValues for InMemoryVectorValues {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn next_vector(&mut self) -> Result<Option<(u32, &[f32])>> {
        let Some((doc, vector)) = self.entries.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some((*doc, vector.as_slice())))
    }
}

/// Read access to the vectors of a segment taking part in a merge.
pub trait SegmentVectorsReader: Send + Sync + std::fmt::Debug {
    /// A fresh iterator over `field`, or `None` when the segment has no such field.
    fn float_vector_values(&self, field: &str) -> Result<Option<Box<dyn FloatVectorValues>>>;
}

/// A [`SegmentVectorsReader`] over in-memory fields.
#[derive(Debug, Clone, Default)]
pub struct InMemorySegmentVectors {
    fields: HashMap<String, InMemoryVectorValues>,
}

impl InMemorySegmentVectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with `(doc, vector)` pairs in increasing doc order.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        dimension: usize,
        entries: Vec<(u32, Vec<f32>)>,
    ) -> Result<()> {
        let values = InMemoryVectorValues::new(dimension, entries)?;
        self.fields.insert(name.into(), values);
        Ok(())
    }
}

impl SegmentVectorsReader for InMemorySegmentVectors {
    fn float_vector_values(&self, field: &str) -> Result<Option<Box<dyn FloatVectorValues>>> {
        Ok(self
            .fields
            .get(field)
            .map(|values| Box::new(values.clone()) as Box<dyn FloatVectorValues>))
    }
}

/// One source segment of a merge.
#[derive(Debug, Clone)]
pub struct MergeSegment {
    /// Vectors of the segment.
    pub reader: Arc<dyn SegmentVectorsReader>,
    /// `doc_map[local_doc]` is the merged doc id, or `None` if the doc was deleted.
    pub doc_map: Vec<Option<u32>>,
}

impl MergeSegment {
    pub fn new(reader: Arc<dyn SegmentVectorsReader>, doc_map: Vec<Option<u32>>) -> Self {
        MergeSegment { reader, doc_map }
    }

    /// A segment whose `max_doc` documents are appended after `doc_base`, minus `deleted`.
    pub fn with_deletions(
        reader: Arc<dyn SegmentVectorsReader>,
        max_doc: u32,
        doc_base: u32,
        deleted: &[u32],
    ) -> Self {
        let mut doc_map = Vec::with_capacity(max_doc as usize);
        let mut next = doc_base;
        for doc in 0..max_doc {
            if deleted.contains(&doc) {
                doc_map.push(None);
            } else {
                doc_map.push(Some(next));
                next += 1;
            }
        }
        MergeSegment { reader, doc_map }
    }

    /// Number of live documents, i.e. those with a merged id.
    pub fn live_docs(&self) -> u32 {
        self.doc_map.iter().filter(|d| d.is_some()).count() as u32
    }
}

/// State of a merge: the source segments in merge order.
#[derive(Debug, Clone, Default)]
pub struct MergeState {
    pub segments: Vec<MergeSegment>,
}

impl MergeState {
    pub fn new(segments: Vec<MergeSegment>) -> Self {
        MergeState { segments }
    }
}

#[derive(Debug)]
struct MergeSub {
    values: Box<dyn FloatVectorValues>,
    doc_map: Vec<Option<u32>>,
    current: Option<(u32, Vec<f32>)>,
}

impl MergeSub {
    /// Move to the next live document, skipping deleted ones.
    fn advance(&mut self) -> Result<()> {
        self.current = None;
        while let Some((doc, vector)) = self.values.next_vector()? {
            match self.doc_map.get(doc as usize) {
                Some(Some(merged)) => {
                    self.current = Some((*merged, vector.to_vec()));
                    break;
                }
                Some(None) => {}
                None => {
                    return Err(PilumError::invalid_argument(format!(
                        "doc {doc} is outside the doc map of {} documents",
                        self.doc_map.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Live vectors of one field across all merging segments, in merged doc order.
#[derive(Debug)]
pub struct MergedVectorValues {
    dimension: usize,
    size: usize,
    subs: Vec<MergeSub>,
    queue: BinaryHeap<Reverse<(u32, usize)>>,
    current: Vec<f32>,
}

impl MergedVectorValues {
    /// Merge the float vectors of `field` across `merge_state`.
    ///
    /// Segments without the field are skipped.
    pub fn merge_float_vector_values(
        field: &FieldInfo,
        merge_state: &MergeState,
    ) -> Result<MergedVectorValues> {
        if field.encoding != VectorEncoding::Float32 {
            return Err(PilumError::unsupported_encoding(field.encoding.name()));
        }

        let mut subs = Vec::with_capacity(merge_state.segments.len());
        let mut size = 0;
        for segment in &merge_state.segments {
            let Some(values) = segment.reader.float_vector_values(&field.name)? else {
                continue;
            };
            if values.dimension() != field.dimension {
                return Err(PilumError::DimensionMismatch {
                    expected: field.dimension,
                    actual: values.dimension(),
                });
            }
            size += values.size();
            subs.push(MergeSub {
                values,
                doc_map: segment.doc_map.clone(),
                current: None,
            });
        }

        let mut queue = BinaryHeap::with_capacity(subs.len());
        for (index, sub) in subs.iter_mut().enumerate() {
            sub.advance()?;
            if let Some((doc, _)) = &sub.current {
                queue.push(Reverse((*doc, index)));
            }
        }

        Ok(MergedVectorValues {
            dimension: field.dimension,
            size,
            subs,
            queue,
            current: Vec::new(),
        })
    }
}

impl FloatVectorValues for MergedVectorValues {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn size(&self) -> usize {
        self.size
    }

    fn next_vector(&mut self) -> Result<Option<(u32, &[f32])>> {
        let Some(Reverse((doc, index))) = self.queue.pop() else {
            return Ok(None);
        };
        let sub = &mut self.subs[index];
        if let Some((_, vector)) = sub.current.take() {
            self.current = vector;
        }
        sub.advance()?;
        if let Some((next_doc, _)) = &sub.current {
            self.queue.push(Reverse((*next_doc, index)));
        }
        Ok(Some((doc, self.current.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::similarity::VectorSimilarity;

    fn field() -> FieldInfo {
        FieldInfo::new("v", 0, 1, VectorSimilarity::Euclidean)
    }

    fn segment(entries: Vec<(u32, Vec<f32>)>) -> Arc<dyn SegmentVectorsReader> {
        let mut reader = InMemorySegmentVectors::new();
        reader.add_field("v", 1, entries).unwrap();
        Arc::new(reader)
    }

    fn drain(values: &mut dyn FloatVectorValues) -> Vec<(u32, f32)> {
        let mut out = Vec::new();
        while let Some((doc, vector)) = values.next_vector().unwrap() {
            out.push((doc, vector[0]));
        }
        out
    }

    #[test]
    fn test_in_memory_values_validate_order() {
        assert!(InMemoryVectorValues::new(1, vec![(2, vec![0.0]), (1, vec![0.0])]).is_err());
        assert!(InMemoryVectorValues::new(2, vec![(0, vec![0.0])]).is_err());
    }

    #[test]
    fn test_merge_concatenates_segments() {
        let first = segment(vec![(0, vec![1.0]), (1, vec![2.0])]);
        let second = segment(vec![(0, vec![3.0]), (2, vec![4.0])]);
        let state = MergeState::new(vec![
            MergeSegment::with_deletions(first, 2, 0, &[]),
            MergeSegment::with_deletions(second, 3, 2, &[]),
        ]);

        let mut merged = MergedVectorValues::merge_float_vector_values(&field(), &state).unwrap();
        assert_eq!(merged.size(), 4);
        assert_eq!(
            drain(&mut merged),
            vec![(0, 1.0), (1, 2.0), (2, 3.0), (4, 4.0)]
        );
    }

    #[test]
    fn test_merge_skips_deleted_docs() {
        let first = segment(vec![(0, vec![1.0]), (1, vec![2.0]), (2, vec![3.0])]);
        let state = MergeState::new(vec![MergeSegment::with_deletions(first, 3, 0, &[1])]);

        let mut merged = MergedVectorValues::merge_float_vector_values(&field(), &state).unwrap();
        assert_eq!(drain(&mut merged), vec![(0, 1.0), (1, 3.0)]);
    }

    #[test]
    fn test_merge_interleaves_by_merged_doc() {
        let first = segment(vec![(0, vec![1.0]), (1, vec![2.0])]);
        let second = segment(vec![(0, vec![3.0]), (1, vec![4.0])]);
        let state = MergeState::new(vec![
            MergeSegment::new(first, vec![Some(1), Some(3)]),
            MergeSegment::new(second, vec![Some(0), Some(2)]),
        ]);

        let mut merged = MergedVectorValues::merge_float_vector_values(&field(), &state).unwrap();
        assert_eq!(
            drain(&mut merged),
            vec![(0, 3.0), (1, 1.0), (2, 4.0), (3, 2.0)]
        );
    }

    #[test]
    fn test_merge_skips_segments_without_field() {
        let state = MergeState::new(vec![MergeSegment::new(
            Arc::new(InMemorySegmentVectors::new()),
            vec![Some(0)],
        )]);
        let mut merged = MergedVectorValues::merge_float_vector_values(&field(), &state).unwrap();
        assert_eq!(merged.size(), 0);
        assert!(merged.next_vector().unwrap().is_none());
    }

    #[test]
    fn test_merge_rejects_byte_fields() {
        let field = field().with_encoding(VectorEncoding::Byte);
        let err = MergedVectorValues::merge_float_vector_values(&field, &MergeState::default())
            .unwrap_err();
        assert!(matches!(err, PilumError::UnsupportedEncoding(_)));
    }
}
