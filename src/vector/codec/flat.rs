//! Flat storage of the raw vectors of a segment.
//!
//! The vector index writer hands every field to a [`FlatVectorsWriter`]
//! first. The delegate owns the per-field buffers and persists the raw
//! vectors; the index writer reads the same buffers to build its indexes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PilumError, Result};
use crate::storage::StorageOutput;
use crate::storage::structured::StructWriter;
use crate::vector::codec::SegmentWriteState;
use crate::vector::field::{FieldInfo, FieldVectorBuffer, SharedFieldBuffer};
use crate::vector::merge::{FloatVectorValues, MergeState, MergedVectorValues};
use crate::vector::sort::{DocMap, map_old_ord_to_new_ord};

/// Codec name of the raw vector data file.
pub const FLAT_CODEC_NAME: &str = "PilumFlatVectorsData";
pub const FLAT_VERSION_CURRENT: u32 = 0;
/// Extension of the raw vector data file.
pub const FLAT_EXT: &str = "pvd";

/// Writer of raw vectors, shared by every vector index format.
pub trait FlatVectorsWriter: Send + std::fmt::Debug {
    /// Register a field and return the buffer its values are collected in.
    fn add_field(&mut self, field: &FieldInfo) -> Result<SharedFieldBuffer>;

    /// Persist the buffered vectors of every field.
    ///
    /// Buffers are left intact; the caller resets them.
    fn flush(&mut self, max_doc: u32, sort_map: Option<&dyn DocMap>) -> Result<()>;

    /// Persist the merged vectors of one field.
    fn merge_one_field(&mut self, field: &FieldInfo, merge_state: &MergeState) -> Result<()>;

    /// Seal the output. May be called once.
    fn finish(&mut self) -> Result<()>;

    /// Release the output. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Approximate heap footprint in bytes.
    fn ram_bytes_used(&self) -> usize;
}

/// Writes raw vectors as `i32 field | i32 dim | i32 count | (varint doc, f32 * dim) * count` blocks.
#[derive(Debug)]
pub struct RawFlatVectorsWriter {
    data: Option<StructWriter<Box<dyn StorageOutput>>>,
    fields: Vec<SharedFieldBuffer>,
    finished: bool,
}

impl RawFlatVectorsWriter {
    /// Create the data file of the segment and write its header.
    pub fn new(state: &SegmentWriteState) -> Result<Self> {
        let output = state.storage.create_output(&state.file_name(FLAT_EXT))?;
        let mut data = StructWriter::new(output);
        data.write_index_header(
            FLAT_CODEC_NAME,
            FLAT_VERSION_CURRENT,
            &state.segment_id,
            &state.segment_suffix,
        )?;
        Ok(RawFlatVectorsWriter {
            data: Some(data),
            fields: Vec::new(),
            finished: false,
        })
    }

    fn data(&mut self) -> Result<&mut StructWriter<Box<dyn StorageOutput>>> {
        self.data
            .as_mut()
            .ok_or_else(|| PilumError::invalid_state("flat vectors writer is closed"))
    }

    fn write_block<'a, I>(&mut self, field: &FieldInfo, count: usize, vectors: I) -> Result<()>
    where
        I: IntoIterator<Item = (u32, &'a [f32])>,
    {
        let data = self.data()?;
        data.write_i32(field.number)?;
        data.write_i32(field.dimension as i32)?;
        data.write_i32(count as i32)?;
        let mut written = 0;
        for (doc, vector) in vectors {
            data.write_varint(doc as u64)?;
            for value in vector {
                data.write_raw(&value.to_le_bytes())?;
            }
            written += 1;
        }
        debug_assert_eq!(written, count);
        Ok(())
    }
}

impl FlatVectorsWriter for RawFlatVectorsWriter {
    fn add_field(&mut self, field: &FieldInfo) -> Result<SharedFieldBuffer> {
        let buffer = Arc::new(Mutex::new(FieldVectorBuffer::new(field.clone())));
        self.fields.push(Arc::clone(&buffer));
        Ok(buffer)
    }

    fn flush(&mut self, _max_doc: u32, sort_map: Option<&dyn DocMap>) -> Result<()> {
        let fields = self.fields.clone();
        for shared in &fields {
            let buffer = shared.lock();
            let docs = buffer.docs_with_field();
            let vectors = buffer.vectors();
            match sort_map {
                None => {
                    let pairs = docs.iter().zip(vectors.iter().map(Vec::as_slice));
                    self.write_block(buffer.field(), vectors.len(), pairs)?;
                }
                Some(sort_map) => {
                    let mapping = map_old_ord_to_new_ord(docs, sort_map)?;
                    let pairs = mapping
                        .new_docs_with_field
                        .iter()
                        .zip(mapping.new_to_old_ord.iter().map(|&old| vectors[old].as_slice()));
                    self.write_block(buffer.field(), vectors.len(), pairs)?;
                }
            }
        }
        Ok(())
    }

    fn merge_one_field(&mut self, field: &FieldInfo, merge_state: &MergeState) -> Result<()> {
        let mut values = MergedVectorValues::merge_float_vector_values(field, merge_state)?;
        let mut merged = Vec::with_capacity(values.size());
        while let Some((doc, vector)) = values.next_vector()? {
            merged.push((doc, vector.to_vec()));
        }
        let pairs = merged.iter().map(|(doc, vector)| (*doc, vector.as_slice()));
        self.write_block(field, merged.len(), pairs)
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(PilumError::invalid_state("already finished"));
        }
        self.finished = true;
        let data = self.data()?;
        data.write_i32(-1)?;
        data.write_footer()
    }

    fn close(&mut self) -> Result<()> {
        match self.data.take() {
            Some(mut data) => data.close(),
            None => Ok(()),
        }
    }

    fn ram_bytes_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .fields
                .iter()
                .map(|buffer| buffer.lock().ram_bytes_used())
                .sum::<usize>()
    }
}
