//! Segment writer for vector indexes.
//!
//! [`PilumVectorsWriter`] buffers vectors per field, builds the requested
//! index representations on flush or merge and appends them to the index
//! blob. Each field gets one metadata row pointing at its sub-indexes.
//! The metadata and blob streams are sealed with a footer only by a
//! successful [`PilumVectorsWriter::finish`].

use std::sync::Arc;

use crate::error::{PilumError, Result};
use crate::storage::StorageOutput;
use crate::storage::structured::StructWriter;
use crate::vector::codec::SegmentWriteState;
use crate::vector::codec::flat::FlatVectorsWriter;
use crate::vector::codec::format::{
    END_OF_FIELDS, FieldMetaRow, INDEX_CODEC_NAME, INDEX_EXT, IndexRepresentation, MAX_DIMENSIONS,
    META_CODEC_NAME, META_EXT, VERSION_CURRENT,
};
use crate::vector::config::WriterConfig;
use crate::vector::dataset::Dataset;
use crate::vector::field::{FieldInfo, FieldVectorSink, SharedFieldBuffer, VectorEncoding};
use crate::vector::index::kind::{IndexKind, IndexTypeSet};
use crate::vector::index::policy::{DegradationPolicy, Recovery};
use crate::vector::index::strategy::IndexBuilder;
use crate::vector::info::{InfoStream, PILUM_COMPONENT};
use crate::vector::library::IndexLibrary;
use crate::vector::merge::{MergeState, MergedVectorValues};
use crate::vector::sort::DocMap;

type Output = StructWriter<Box<dyn StorageOutput>>;

/// Lifecycle state of a [`PilumVectorsWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting fields, flushes and merges.
    Open,
    /// Both streams are sealed.
    Finished,
    /// A flush or merge failed; the streams will never be sealed.
    Failed,
    /// Every stream has been released.
    Closed,
}

#[derive(Debug)]
struct FieldWriter {
    info: FieldInfo,
    buffer: SharedFieldBuffer,
}

/// Writes the vector indexes of one segment.
#[derive(Debug)]
pub struct PilumVectorsWriter {
    meta_file: String,
    index_file: String,
    fields: Vec<FieldWriter>,
    flat: Box<dyn FlatVectorsWriter>,
    meta: Option<Output>,
    index: Option<Output>,
    builder: IndexBuilder,
    policy: DegradationPolicy,
    index_types: IndexTypeSet,
    info_stream: Arc<dyn InfoStream>,
    state: WriterState,
}

impl PilumVectorsWriter {
    /// Create the metadata and index blob files of the segment and write their headers.
    ///
    /// On failure every stream opened so far, including `flat`, is closed.
    pub fn new(
        state: &SegmentWriteState,
        config: &WriterConfig,
        library: Arc<dyn IndexLibrary>,
        mut flat: Box<dyn FlatVectorsWriter>,
    ) -> Result<Self> {
        config.validate()?;
        let meta_file = state.file_name(META_EXT);
        let index_file = state.file_name(INDEX_EXT);

        let mut meta = None;
        let mut index = None;
        let opened = (|| -> Result<()> {
            let output = meta.insert(StructWriter::new(state.storage.create_output(&meta_file)?));
            output.write_index_header(
                META_CODEC_NAME,
                VERSION_CURRENT,
                &state.segment_id,
                &state.segment_suffix,
            )?;
            let output =
                index.insert(StructWriter::new(state.storage.create_output(&index_file)?));
            output.write_index_header(
                INDEX_CODEC_NAME,
                VERSION_CURRENT,
                &state.segment_id,
                &state.segment_suffix,
            )?;
            Ok(())
        })();
        if let Err(e) = opened {
            for output in [meta.as_mut(), index.as_mut()].into_iter().flatten() {
                let _ = output.close();
            }
            let _ = flat.close();
            return Err(e);
        }

        let builder = IndexBuilder::new(
            library,
            config.graph_params(),
            config.brute_force_params(),
            Arc::clone(&state.info_stream),
        )
        .with_thresholds(config.graph_thresholds);

        log::debug!(
            "opened vector segment writer for {meta_file} and {index_file} (index types: {})",
            config.index_types
        );

        Ok(PilumVectorsWriter {
            meta_file,
            index_file,
            fields: Vec::new(),
            flat,
            meta,
            index,
            builder,
            policy: DegradationPolicy::new(config.graph_thresholds),
            index_types: config.index_types,
            info_stream: Arc::clone(&state.info_stream),
            state: WriterState::Open,
        })
    }

    /// Register a field and return the sink its vectors are added through.
    ///
    /// Fields are written in registration order. A field whose encoding is not
    /// float32 is rejected before anything is registered.
    pub fn add_field(&mut self, field: FieldInfo) -> Result<FieldVectorSink> {
        self.ensure_open()?;
        check_encoding(&field)?;
        check_number(&field)?;
        if field.dimension == 0 || field.dimension > MAX_DIMENSIONS {
            return Err(PilumError::invalid_argument(format!(
                "field '{}' has dimension {}, expected 1..={MAX_DIMENSIONS}",
                field.name, field.dimension
            )));
        }
        if self.fields.iter().any(|f| f.info.number == field.number) {
            return Err(PilumError::invalid_argument(format!(
                "field number {} is already registered",
                field.number
            )));
        }

        let buffer = self.flat.add_field(&field)?;
        self.fields.push(FieldWriter {
            info: field,
            buffer: Arc::clone(&buffer),
        });
        Ok(FieldVectorSink::new(buffer))
    }

    /// Persist the vectors buffered since the last flush.
    ///
    /// With a `sort_map` the vectors are reordered into the new document
    /// order before any index is built. Buffers are empty afterwards.
    pub fn flush(&mut self, max_doc: u32, sort_map: Option<&dyn DocMap>) -> Result<()> {
        self.ensure_open()?;
        let result = self.flush_fields(max_doc, sort_map);
        self.record(result)
    }

    fn flush_fields(&mut self, max_doc: u32, sort_map: Option<&dyn DocMap>) -> Result<()> {
        self.flat.flush(max_doc, sort_map)?;
        for i in 0..self.fields.len() {
            let field = self.fields[i].info.clone();
            let (vectors, docs) = self.fields[i].buffer.lock().take();
            let dataset = match sort_map {
                Some(sort_map) => {
                    Dataset::from_sorted_vectors(&vectors, &docs, field.dimension, sort_map)?
                }
                None => Dataset::from_vectors(&vectors, field.dimension)?,
            };
            drop(vectors);
            self.write_field(&field, &dataset)?;
        }
        Ok(())
    }

    /// Rebuild the indexes of `field` from the segments being merged.
    pub fn merge_one_field(&mut self, field: &FieldInfo, merge_state: &MergeState) -> Result<()> {
        self.ensure_open()?;
        check_encoding(field)?;
        check_number(field)?;
        let result = self.merge_field(field, merge_state);
        self.record(result)
    }

    fn merge_field(&mut self, field: &FieldInfo, merge_state: &MergeState) -> Result<()> {
        self.flat.merge_one_field(field, merge_state)?;
        let mut values = MergedVectorValues::merge_float_vector_values(field, merge_state)?;
        let dataset = Dataset::from_vector_values(&mut values)?;
        self.write_field(field, &dataset)
    }

    /// Append the sub-indexes of `field` to the blob, then its metadata row.
    fn write_field(&mut self, field: &FieldInfo, dataset: &Dataset) -> Result<()> {
        let index = self
            .index
            .as_mut()
            .ok_or_else(|| PilumError::invalid_state("index output is closed"))?;

        // An empty field points all three representations at the current blob position.
        let mut row = FieldMetaRow::empty(field, index.position());
        if !dataset.is_empty() {
            row.count = dataset.size();
            let mut types = self.policy.plan(self.index_types, dataset.size());
            if !types.contains(IndexKind::FastGraph) && self.index_types.contains(IndexKind::FastGraph)
            {
                log::debug!(
                    "field '{}' has {} vectors, building brute-force instead of fast-graph",
                    field.name,
                    dataset.size()
                );
            }

            for kind in IndexKind::ALL {
                let start = index.position();
                let attempt = types.contains(kind)
                    && (kind != IndexKind::CpuGraph
                        || self.policy.should_attempt_cpu_graph(dataset.size()));
                if !attempt {
                    *row.representation_mut(kind) = IndexRepresentation::empty_at(start);
                    continue;
                }

                let built = match kind {
                    IndexKind::FastGraph => {
                        self.builder.write_fast_graph(&field.name, dataset, &mut *index)
                    }
                    IndexKind::BruteForce => {
                        self.builder.write_brute_force(&field.name, dataset, &mut *index)
                    }
                    IndexKind::CpuGraph => {
                        self.builder.write_cpu_graph(&field.name, dataset, &mut *index)
                    }
                };
                match built {
                    Ok(_) => {
                        *row.representation_mut(kind) =
                            IndexRepresentation::new(start, index.position() - start);
                    }
                    Err(e) if index.position() != start => {
                        // Bytes already in the blob cannot be recorded as an empty representation.
                        return Err(e);
                    }
                    Err(e) => {
                        let message = e.to_string();
                        match self.policy.on_failure(kind, e)? {
                            Recovery::Skip => {
                                log::warn!("skipping {kind} index of field '{}': {message}", field.name);
                            }
                            Recovery::FallBackToBruteForce => {
                                log::warn!(
                                    "falling back to brute-force for field '{}': {message}",
                                    field.name
                                );
                                types = IndexTypeSet::BRUTE_FORCE;
                            }
                        }
                        *row.representation_mut(kind) = IndexRepresentation::empty_at(start);
                    }
                }
            }
        }

        let meta = self
            .meta
            .as_mut()
            .ok_or_else(|| PilumError::invalid_state("metadata output is closed"))?;
        row.write_to(meta)?;
        log::debug!(
            "wrote field '{}' ({} vectors) to {}",
            field.name,
            row.count,
            self.index_file
        );
        Ok(())
    }

    /// Seal both streams. Only one call may succeed.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            WriterState::Open => {}
            WriterState::Finished => return Err(PilumError::invalid_state("already finished")),
            WriterState::Failed => {
                return Err(PilumError::invalid_state(
                    "cannot finish a writer after a failed flush or merge",
                ));
            }
            WriterState::Closed => return Err(PilumError::invalid_state("writer is closed")),
        }
        let result = self.seal();
        if result.is_ok() {
            self.state = WriterState::Finished;
        }
        self.record(result)
    }

    fn seal(&mut self) -> Result<()> {
        self.flat.finish()?;
        let (Some(meta), Some(index)) = (self.meta.as_mut(), self.index.as_mut()) else {
            return Err(PilumError::invalid_state("outputs are closed"));
        };
        meta.write_i32(END_OF_FIELDS)?;
        meta.write_footer()?;
        index.write_footer()?;
        if self.info_stream.is_enabled(PILUM_COMPONENT) {
            self.info_stream.message(
                PILUM_COMPONENT,
                &format!(
                    "finished {} ({} bytes) and {} ({} bytes)",
                    self.meta_file,
                    meta.position(),
                    self.index_file,
                    index.position()
                ),
            );
        }
        Ok(())
    }

    /// Release every stream and the flat delegate.
    ///
    /// Every release is attempted; the first error is returned. Closing a
    /// closed writer does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closed;

        let mut first_error = None;
        let mut keep = |result: Result<()>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };
        keep(self.flat.close());
        if let Some(mut meta) = self.meta.take() {
            keep(meta.close());
        }
        if let Some(mut index) = self.index.take() {
            keep(index.close());
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Approximate heap footprint of the writer and its buffered vectors.
    pub fn ram_bytes_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .fields
                .iter()
                .map(|f| std::mem::size_of::<FieldWriter>() + f.buffer.lock().ram_bytes_used())
                .sum::<usize>()
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Name of the metadata file.
    pub fn meta_file_name(&self) -> &str {
        &self.meta_file
    }

    /// Name of the index blob file.
    pub fn index_file_name(&self) -> &str {
        &self.index_file
    }

    /// Registered fields in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldInfo> + '_ {
        self.fields.iter().map(|f| &f.info)
    }

    pub fn index_types(&self) -> IndexTypeSet {
        self.index_types
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Finished => Err(PilumError::invalid_state("writer already finished")),
            WriterState::Failed => Err(PilumError::invalid_state(
                "writer failed during a previous flush or merge",
            )),
            WriterState::Closed => Err(PilumError::invalid_state("writer is closed")),
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() && self.state == WriterState::Open {
            self.state = WriterState::Failed;
        }
        result
    }
}

fn check_encoding(field: &FieldInfo) -> Result<()> {
    if field.encoding != VectorEncoding::Float32 {
        return Err(PilumError::unsupported_encoding(field.encoding.name()));
    }
    Ok(())
}

/// Negative numbers are reserved for the end-of-fields marker.
fn check_number(field: &FieldInfo) -> Result<()> {
    if field.number < 0 {
        return Err(PilumError::invalid_argument(format!(
            "field '{}' has negative number {}",
            field.name, field.number
        )));
    }
    Ok(())
}

impl Drop for PilumVectorsWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close vector writer for {}: {e}", self.meta_file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::storage::Storage;
    use crate::storage::memory::MemoryStorage;
    use crate::vector::codec::flat::RawFlatVectorsWriter;
    use crate::vector::codec::format::FieldMetaReader;
    use crate::vector::index::params::{BruteForceIndexParams, GraphIndexParams};
    use crate::vector::index::policy::GraphThresholds;
    use crate::vector::info::MemoryInfoStream;
    use crate::vector::library::reference::ReferenceLibrary;
    use crate::vector::library::{LibraryError, LibraryErrorKind, LibraryResult, NativeIndex};
    use crate::vector::similarity::VectorSimilarity;

    const ID: [u8; 16] = [5; 16];

    /// Fails every graph build with `kind` and delegates brute-force builds.
    #[derive(Debug)]
    struct FailingGraphLibrary {
        kind: LibraryErrorKind,
        inner: ReferenceLibrary,
    }

    impl FailingGraphLibrary {
        fn new(kind: LibraryErrorKind) -> Self {
            FailingGraphLibrary {
                kind,
                inner: ReferenceLibrary::default(),
            }
        }
    }

    impl IndexLibrary for FailingGraphLibrary {
        fn build_graph(
            &self,
            _dataset: &Dataset,
            _params: &GraphIndexParams,
        ) -> LibraryResult<Box<dyn NativeIndex>> {
            Err(LibraryError::new(self.kind, "graph build failed"))
        }

        fn build_brute_force(
            &self,
            dataset: &Dataset,
            params: &BruteForceIndexParams,
        ) -> LibraryResult<Box<dyn NativeIndex>> {
            self.inner.build_brute_force(dataset, params)
        }

        fn temp_directory(&self) -> &Path {
            self.inner.temp_directory()
        }
    }

    fn open(
        storage: &Arc<MemoryStorage>,
        index_types: IndexTypeSet,
        library: Arc<dyn IndexLibrary>,
    ) -> PilumVectorsWriter {
        let state = SegmentWriteState::new(storage.clone(), "_0")
            .with_segment_id(ID)
            .with_info_stream(Arc::new(MemoryInfoStream::new()));
        let config = WriterConfig {
            index_types,
            brute_force_threads: 1,
            ..Default::default()
        };
        let flat = RawFlatVectorsWriter::new(&state).unwrap();
        PilumVectorsWriter::new(&state, &config, library, Box::new(flat)).unwrap()
    }

    fn reference() -> Arc<dyn IndexLibrary> {
        Arc::new(ReferenceLibrary::default())
    }

    fn field(number: i32) -> FieldInfo {
        FieldInfo::new(format!("f{number}"), number, 2, VectorSimilarity::Euclidean)
    }

    #[test]
    fn test_add_field_rejects_byte_encoding() {
        let storage = Arc::new(MemoryStorage::default());
        let mut writer = open(&storage, IndexTypeSet::FAST_GRAPH, reference());
        let err = writer
            .add_field(field(0).with_encoding(VectorEncoding::Byte))
            .unwrap_err();

        assert!(matches!(err, PilumError::UnsupportedEncoding(_)));
        assert_eq!(writer.fields().count(), 0);
        assert_eq!(writer.state(), WriterState::Open);
    }

    #[test]
    fn test_add_field_rejects_duplicates() {
        let storage = Arc::new(MemoryStorage::default());
        let mut writer = open(&storage, IndexTypeSet::FAST_GRAPH, reference());
        writer.add_field(field(1)).unwrap();
        assert!(writer.add_field(field(1)).is_err());
        assert!(
            writer
                .add_field(FieldInfo::new("zero", 2, 0, VectorSimilarity::Euclidean))
                .is_err()
        );
    }

    #[test]
    fn test_negative_field_number_is_rejected() {
        let storage = Arc::new(MemoryStorage::default());
        let mut writer = open(&storage, IndexTypeSet::BRUTE_FORCE, reference());
        for number in [END_OF_FIELDS, -7] {
            let err = writer
                .add_field(FieldInfo::new("neg", number, 2, VectorSimilarity::Euclidean))
                .unwrap_err();
            assert!(matches!(err, PilumError::InvalidArgument(_)));
        }
        assert_eq!(writer.fields().count(), 0);

        let merge_state = MergeState::new(Vec::new());
        let err = writer
            .merge_one_field(
                &FieldInfo::new("neg", -1, 2, VectorSimilarity::Euclidean),
                &merge_state,
            )
            .unwrap_err();
        assert!(matches!(err, PilumError::InvalidArgument(_)));
        assert_eq!(writer.state(), WriterState::Open);

        writer.finish().unwrap();
        writer.close().unwrap();
        let meta = FieldMetaReader::read(storage.as_ref(), "_0", "", Some(&ID)).unwrap();
        assert!(meta.rows.is_empty());
    }

    #[test]
    fn test_cpu_graph_threshold_independent_of_fast_graph() {
        let storage = Arc::new(MemoryStorage::default());
        let state = SegmentWriteState::new(storage.clone(), "_0")
            .with_segment_id(ID)
            .with_info_stream(Arc::new(MemoryInfoStream::new()));
        let config = WriterConfig {
            index_types: IndexTypeSet::BRUTE_FORCE.with(IndexKind::CpuGraph),
            brute_force_threads: 1,
            graph_thresholds: GraphThresholds {
                min_fast_graph_size: 5,
                min_cpu_graph_exclusive: 2,
            },
            ..Default::default()
        };
        let flat = RawFlatVectorsWriter::new(&state).unwrap();
        let mut writer =
            PilumVectorsWriter::new(&state, &config, reference(), Box::new(flat)).unwrap();

        let sink = writer.add_field(field(0)).unwrap();
        for doc in 0..3 {
            sink.add_value(doc, &[doc as f32, 1.0]).unwrap();
        }
        writer.flush(3, None).unwrap();
        writer.finish().unwrap();
        writer.close().unwrap();

        let row = &FieldMetaReader::read(storage.as_ref(), "_0", "", Some(&ID))
            .unwrap()
            .rows[0];
        assert!(row.brute_force.is_present());
        assert!(row.cpu_graph.is_present());
        assert_eq!(row.cpu_graph.offset, row.brute_force.end());
    }

    #[test]
    fn test_flush_resets_buffers() {
        let storage = Arc::new(MemoryStorage::default());
        let mut writer = open(&storage, IndexTypeSet::BRUTE_FORCE, reference());
        let sink = writer.add_field(field(0)).unwrap();
        let empty = writer.ram_bytes_used();
        for doc in 0..4 {
            sink.add_value(doc, &[doc as f32, 1.0]).unwrap();
        }
        assert!(writer.ram_bytes_used() > empty);

        writer.flush(4, None).unwrap();
        assert!(sink.is_empty());
        writer.finish().unwrap();
        writer.close().unwrap();

        let meta = FieldMetaReader::read(storage.as_ref(), "_0", "", Some(&ID)).unwrap();
        assert_eq!(meta.rows.len(), 1);
        assert_eq!(meta.rows[0].count, 4);
        assert!(meta.rows[0].brute_force.is_present());
        assert!(!meta.rows[0].fast_graph.is_present());
    }

    #[test]
    fn test_degenerate_fast_graph_falls_back_to_brute_force() {
        let storage = Arc::new(MemoryStorage::default());
        let library = Arc::new(FailingGraphLibrary::new(LibraryErrorKind::DegenerateGraph));
        let mut writer = open(
            &storage,
            IndexTypeSet::FAST_GRAPH.with(IndexKind::CpuGraph),
            library,
        );
        let sink = writer.add_field(field(0)).unwrap();
        for doc in 0..5 {
            sink.add_value(doc, &[doc as f32, 0.5]).unwrap();
        }

        writer.flush(5, None).unwrap();
        writer.finish().unwrap();
        writer.close().unwrap();

        let row = &FieldMetaReader::read(storage.as_ref(), "_0", "", None)
            .unwrap()
            .rows[0];
        assert_eq!(row.fast_graph.length, 0);
        assert_eq!(row.cpu_graph.length, 0);
        assert!(row.brute_force.is_present());
        assert_eq!(row.brute_force.offset, row.fast_graph.offset);
    }

    #[test]
    fn test_degenerate_cpu_graph_is_skipped() {
        let storage = Arc::new(MemoryStorage::default());
        let library = Arc::new(FailingGraphLibrary::new(LibraryErrorKind::DegenerateGraph));
        let mut writer = open(
            &storage,
            IndexTypeSet::BRUTE_FORCE.with(IndexKind::CpuGraph),
            library,
        );
        let sink = writer.add_field(field(0)).unwrap();
        for doc in 0..3 {
            sink.add_value(doc, &[doc as f32, 0.5]).unwrap();
        }

        writer.flush(3, None).unwrap();
        writer.finish().unwrap();
        writer.close().unwrap();

        let row = &FieldMetaReader::read(storage.as_ref(), "_0", "", None)
            .unwrap()
            .rows[0];
        assert!(row.brute_force.is_present());
        assert_eq!(row.cpu_graph, IndexRepresentation::empty_at(row.brute_force.end()));
    }

    #[test]
    fn test_fatal_library_error_fails_writer() {
        let storage = Arc::new(MemoryStorage::default());
        let library = Arc::new(FailingGraphLibrary::new(LibraryErrorKind::Internal));
        let mut writer = open(&storage, IndexTypeSet::FAST_GRAPH, library);
        let sink = writer.add_field(field(0)).unwrap();
        for doc in 0..3 {
            sink.add_value(doc, &[doc as f32, 0.5]).unwrap();
        }

        let err = writer.flush(3, None).unwrap_err();
        assert!(matches!(
            err,
            PilumError::IndexBuild {
                kind: IndexKind::FastGraph,
                ..
            }
        ));
        assert_eq!(writer.state(), WriterState::Failed);
        assert!(matches!(
            writer.finish(),
            Err(PilumError::InvalidState(_))
        ));
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);

        let err = FieldMetaReader::read(storage.as_ref(), "_0", "", None).unwrap_err();
        assert!(matches!(err, PilumError::CorruptIndex(_)));
        assert!(FieldMetaReader::verify_index(storage.as_ref(), "_0", "", &ID).is_err());
    }

    #[test]
    fn test_finish_twice() {
        let storage = Arc::new(MemoryStorage::default());
        let mut writer = open(&storage, IndexTypeSet::FAST_GRAPH, reference());
        writer.finish().unwrap();
        match writer.finish() {
            Err(PilumError::InvalidState(message)) => assert_eq!(message, "already finished"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(writer.flush(0, None).is_err());
    }

    #[test]
    fn test_drop_closes_outputs() {
        let storage = Arc::new(MemoryStorage::default());
        {
            let mut writer = open(&storage, IndexTypeSet::FAST_GRAPH, reference());
            writer.finish().unwrap();
        }
        assert!(storage.file_exists("_0.pvm"));
        assert!(storage.file_exists("_0.pvi"));
        assert!(storage.file_exists("_0.pvd"));
        let meta = FieldMetaReader::read(storage.as_ref(), "_0", "", Some(&ID)).unwrap();
        assert!(meta.rows.is_empty());
    }
}
