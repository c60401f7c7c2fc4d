//! On-disk layout of the vector index files of a segment.
//!
//! ```text
//! metadata (.pvm):  header | row* | i32 -1 | footer
//!   row:            i32 field number | i32 encoding | i32 similarity | i32 dimension | i32 count
//!                   | (varint offset, varint length) for fast-graph, brute-force, cpu-graph
//! index blob (.pvi): header | sub-indexes of each field in row order | footer
//! ```
//!
//! Offsets point into the index blob. A representation that was not built has
//! length 0 and its offset is still the blob position at which it would have
//! started.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{PilumError, Result};
use crate::storage::structured::{FOOTER_LENGTH, ID_LENGTH, StructReader, StructWriter};
use crate::storage::{Storage, StorageInput, StorageOutput};
use crate::vector::codec::SegmentWriteState;
use crate::vector::codec::flat::RawFlatVectorsWriter;
use crate::vector::codec::writer::PilumVectorsWriter;
use crate::vector::config::WriterConfig;
use crate::vector::field::{FieldInfo, VectorEncoding};
use crate::vector::index::kind::IndexKind;
use crate::vector::library::IndexLibrary;
use crate::vector::similarity::VectorSimilarity;

/// Codec name in the metadata file header.
pub const META_CODEC_NAME: &str = "PilumVectorsFormatMeta";
/// Codec name in the index blob header.
pub const INDEX_CODEC_NAME: &str = "PilumVectorsFormatIndex";
pub const VERSION_START: u32 = 0;
pub const VERSION_CURRENT: u32 = VERSION_START;

/// Extension of the metadata file.
pub const META_EXT: &str = "pvm";
/// Extension of the index blob file.
pub const INDEX_EXT: &str = "pvi";

/// Field number of the row terminating the metadata file.
pub const END_OF_FIELDS: i32 = -1;

/// Largest supported vector dimension.
pub const MAX_DIMENSIONS: usize = 4096;

/// File name of a segment file: `<segment>[_<suffix>].<ext>`.
pub fn segment_file_name(segment_name: &str, segment_suffix: &str, ext: &str) -> String {
    if segment_suffix.is_empty() {
        format!("{segment_name}.{ext}")
    } else {
        format!("{segment_name}_{segment_suffix}.{ext}")
    }
}

/// Location of one serialised sub-index inside the index blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexRepresentation {
    pub offset: u64,
    pub length: u64,
}

impl IndexRepresentation {
    pub fn new(offset: u64, length: u64) -> Self {
        IndexRepresentation { offset, length }
    }

    /// A zero-length representation starting at `offset`.
    pub fn empty_at(offset: u64) -> Self {
        IndexRepresentation { offset, length: 0 }
    }

    /// Whether the representation was built.
    pub fn is_present(&self) -> bool {
        self.length > 0
    }

    /// Blob position just past the representation.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// One metadata row describing the indexes of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetaRow {
    pub field_number: i32,
    pub encoding: VectorEncoding,
    pub similarity: VectorSimilarity,
    pub dimension: usize,
    pub count: usize,
    pub fast_graph: IndexRepresentation,
    pub brute_force: IndexRepresentation,
    pub cpu_graph: IndexRepresentation,
}

impl FieldMetaRow {
    /// Row of a field with no vectors; every representation starts at `offset`.
    pub fn empty(field: &FieldInfo, offset: u64) -> Self {
        let empty = IndexRepresentation::empty_at(offset);
        FieldMetaRow {
            field_number: field.number,
            encoding: field.encoding,
            similarity: field.similarity,
            dimension: field.dimension,
            count: 0,
            fast_graph: empty,
            brute_force: empty,
            cpu_graph: empty,
        }
    }

    /// The representation of `kind`.
    pub fn representation(&self, kind: IndexKind) -> &IndexRepresentation {
        match kind {
            IndexKind::FastGraph => &self.fast_graph,
            IndexKind::BruteForce => &self.brute_force,
            IndexKind::CpuGraph => &self.cpu_graph,
        }
    }

    pub fn representation_mut(&mut self, kind: IndexKind) -> &mut IndexRepresentation {
        match kind {
            IndexKind::FastGraph => &mut self.fast_graph,
            IndexKind::BruteForce => &mut self.brute_force,
            IndexKind::CpuGraph => &mut self.cpu_graph,
        }
    }

    pub fn write_to<W: StorageOutput>(&self, meta: &mut StructWriter<W>) -> Result<()> {
        meta.write_i32(self.field_number)?;
        meta.write_i32(self.encoding.ordinal())?;
        meta.write_i32(self.similarity.ordinal())?;
        meta.write_i32(to_i32("dimension", self.dimension)?)?;
        meta.write_i32(to_i32("vector count", self.count)?)?;
        for kind in IndexKind::ALL {
            let representation = self.representation(kind);
            meta.write_varint(representation.offset)?;
            meta.write_varint(representation.length)?;
        }
        Ok(())
    }

    /// Read the rest of a row whose field number has already been read.
    pub fn read_from<R: StorageInput>(
        field_number: i32,
        meta: &mut StructReader<R>,
    ) -> Result<Self> {
        let encoding = VectorEncoding::from_ordinal(meta.read_i32()?)?;
        let similarity = VectorSimilarity::from_ordinal(meta.read_i32()?)?;
        let dimension = from_i32("dimension", meta.read_i32()?)?;
        let count = from_i32("vector count", meta.read_i32()?)?;
        let mut read_representation = || -> Result<IndexRepresentation> {
            let offset = meta.read_varint()?;
            let length = meta.read_varint()?;
            Ok(IndexRepresentation::new(offset, length))
        };
        let fast_graph = read_representation()?;
        let brute_force = read_representation()?;
        let cpu_graph = read_representation()?;

        Ok(FieldMetaRow {
            field_number,
            encoding,
            similarity,
            dimension,
            count,
            fast_graph,
            brute_force,
            cpu_graph,
        })
    }
}

fn to_i32(what: &str, value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| PilumError::invalid_argument(format!("{what} {value} exceeds i32 range")))
}

fn from_i32(what: &str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| PilumError::corrupt(format!("negative {what}: {value}")))
}

/// Decoded metadata file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentMeta {
    pub version: u32,
    #[serde(serialize_with = "serialize_segment_id")]
    pub segment_id: [u8; ID_LENGTH],
    pub rows: Vec<FieldMetaRow>,
}

fn serialize_segment_id<S: serde::Serializer>(
    id: &[u8; ID_LENGTH],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&uuid::Uuid::from_bytes(*id).to_string())
}

fn truncated(name: &str, error: PilumError) -> PilumError {
    match error {
        PilumError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            PilumError::corrupt(format!("{name} ends before the end-of-fields marker"))
        }
        other => other,
    }
}

/// Reader of metadata files, used to verify what a writer produced.
#[derive(Debug)]
pub struct FieldMetaReader;

impl FieldMetaReader {
    /// Read the metadata file of a segment, checking header, rows and footer.
    ///
    /// When `segment_id` is given the header must carry that id.
    pub fn read(
        storage: &dyn Storage,
        segment_name: &str,
        segment_suffix: &str,
        segment_id: Option<&[u8; ID_LENGTH]>,
    ) -> Result<SegmentMeta> {
        let name = segment_file_name(segment_name, segment_suffix, META_EXT);
        let input = storage.open_input(&name)?;
        let mut meta = StructReader::new(input)?;

        let header = meta.read_index_header(
            META_CODEC_NAME,
            VERSION_START,
            VERSION_CURRENT,
            segment_suffix,
        )?;
        if let Some(expected) = segment_id
            && &header.segment_id != expected
        {
            return Err(PilumError::corrupt(format!("segment id mismatch in {name}")));
        }

        let mut rows = Vec::new();
        loop {
            let field_number = meta.read_i32().map_err(|e| truncated(&name, e))?;
            if field_number == END_OF_FIELDS {
                break;
            }
            let row = FieldMetaRow::read_from(field_number, &mut meta)
                .map_err(|e| truncated(&name, e))?;
            rows.push(row);
        }
        meta.check_footer()?;
        meta.close()?;

        Ok(SegmentMeta {
            version: header.version,
            segment_id: header.segment_id,
            rows,
        })
    }

    /// Check the header and footer checksum of a segment's index blob.
    ///
    /// Returns the blob size.
    pub fn verify_index(
        storage: &dyn Storage,
        segment_name: &str,
        segment_suffix: &str,
        segment_id: &[u8; ID_LENGTH],
    ) -> Result<u64> {
        let name = segment_file_name(segment_name, segment_suffix, INDEX_EXT);
        let input = storage.open_input(&name)?;
        let mut index = StructReader::new(input)?;
        index.check_index_header(
            INDEX_CODEC_NAME,
            VERSION_START,
            VERSION_CURRENT,
            segment_id,
            segment_suffix,
        )?;
        let size = index.size();
        let body = size.saturating_sub(index.position() + FOOTER_LENGTH);
        index.read_raw(body as usize)?;
        index.check_footer()?;
        index.close()?;
        Ok(size)
    }
}

/// Vector format bundling writer configuration and index library.
#[derive(Debug, Clone)]
pub struct PilumVectorsFormat {
    config: WriterConfig,
    library: Arc<dyn IndexLibrary>,
}

impl PilumVectorsFormat {
    /// Name of the format.
    pub const NAME: &'static str = "PilumVectorsFormat";

    /// Create a format with a validated configuration.
    pub fn new(config: WriterConfig, library: Arc<dyn IndexLibrary>) -> Result<Self> {
        config.validate()?;
        Ok(PilumVectorsFormat { config, library })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<dyn IndexLibrary> {
        &self.library
    }

    /// Largest vector dimension supported for `field`.
    pub fn max_dimensions(&self, _field: &str) -> usize {
        MAX_DIMENSIONS
    }

    /// Open a writer for the segment described by `state`.
    pub fn fields_writer(&self, state: &SegmentWriteState) -> Result<PilumVectorsWriter> {
        let flat = RawFlatVectorsWriter::new(state)?;
        PilumVectorsWriter::new(state, &self.config, Arc::clone(&self.library), Box::new(flat))
    }
}
