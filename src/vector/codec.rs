//! Segment codec for vector indexes.
//!
//! A segment written by [`writer::PilumVectorsWriter`] consists of a metadata
//! file and an index blob file (see [`format`]), plus the raw vectors written
//! by the flat delegate (see [`flat`]).

use std::sync::Arc;

use crate::storage::Storage;
use crate::storage::structured::ID_LENGTH;
use crate::vector::info::{InfoStream, LogInfoStream};

pub mod flat;
pub mod format;
pub mod writer;

pub use format::{
    FieldMetaReader, FieldMetaRow, IndexRepresentation, PilumVectorsFormat, SegmentMeta,
};
pub use writer::PilumVectorsWriter;

/// Everything a writer needs to know about the segment it writes.
#[derive(Debug, Clone)]
pub struct SegmentWriteState {
    /// Segment name, e.g. `_0`.
    pub segment_name: String,
    /// Optional suffix distinguishing several files of the same format.
    pub segment_suffix: String,
    /// Unique id stamped into every file header.
    pub segment_id: [u8; ID_LENGTH],
    /// Directory the segment files are created in.
    pub storage: Arc<dyn Storage>,
    /// Diagnostic sink.
    pub info_stream: Arc<dyn InfoStream>,
}

impl SegmentWriteState {
    /// State for segment `segment_name` with a fresh random id.
    pub fn new<S: Into<String>>(storage: Arc<dyn Storage>, segment_name: S) -> Self {
        SegmentWriteState {
            segment_name: segment_name.into(),
            segment_suffix: String::new(),
            segment_id: *uuid::Uuid::new_v4().as_bytes(),
            storage,
            info_stream: Arc::new(LogInfoStream),
        }
    }

    pub fn with_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.segment_suffix = suffix.into();
        self
    }

    pub fn with_segment_id(mut self, segment_id: [u8; ID_LENGTH]) -> Self {
        self.segment_id = segment_id;
        self
    }

    pub fn with_info_stream(mut self, info_stream: Arc<dyn InfoStream>) -> Self {
        self.info_stream = info_stream;
        self
    }

    /// Name of this segment's file with extension `ext`.
    pub fn file_name(&self, ext: &str) -> String {
        format::segment_file_name(&self.segment_name, &self.segment_suffix, ext)
    }
}
