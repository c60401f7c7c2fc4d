use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pilum::error::PilumError;
use pilum::storage::memory::MemoryStorage;
use pilum::vector::codec::format::FieldMetaReader;
use pilum::vector::codec::writer::WriterState;
use pilum::vector::codec::{PilumVectorsFormat, SegmentWriteState};
use pilum::vector::config::WriterConfig;
use pilum::vector::dataset::Dataset;
use pilum::vector::field::FieldInfo;
use pilum::vector::index::kind::{IndexKind, IndexTypeSet};
use pilum::vector::index::params::{BruteForceIndexParams, GraphIndexParams};
use pilum::vector::library::{
    DEGENERATE_GRAPH_MESSAGE, IndexLibrary, LibraryError, LibraryErrorKind, LibraryResult,
    NativeIndex,
};
use pilum::vector::similarity::VectorSimilarity;

/// How the mock library misbehaves.
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Graph builds report a message the adapter classifies as degenerate.
    DegenerateMessage,
    /// Brute-force serialisation fails after writing a few bytes.
    SerializeError,
    /// Graph serialisation reports a degenerate graph after writing a few bytes.
    PartialGraph,
}

#[derive(Debug)]
struct MockLibrary {
    fault: Fault,
    destroyed: Arc<AtomicUsize>,
    temp_dir: PathBuf,
}

impl MockLibrary {
    fn new(fault: Fault) -> Self {
        MockLibrary {
            fault,
            destroyed: Arc::new(AtomicUsize::new(0)),
            temp_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug)]
struct MockIndex {
    fail_serialize: Option<LibraryErrorKind>,
    destroyed: Arc<AtomicUsize>,
}

impl NativeIndex for MockIndex {
    fn serialize(&mut self, sink: &mut dyn Write, _scratch: Option<&Path>) -> LibraryResult<()> {
        sink.write_all(b"MOCK")?;
        if let Some(kind) = self.fail_serialize {
            return Err(LibraryError::new(kind, "device lost"));
        }
        Ok(())
    }

    fn destroy(&mut self) -> LibraryResult<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl IndexLibrary for MockLibrary {
    fn build_graph(
        &self,
        _dataset: &Dataset,
        _params: &GraphIndexParams,
    ) -> LibraryResult<Box<dyn NativeIndex>> {
        match self.fault {
            Fault::DegenerateMessage => Err(LibraryError::from_message(format!(
                "graph build failed: {DEGENERATE_GRAPH_MESSAGE} (24 of 32)"
            ))),
            Fault::SerializeError => Ok(Box::new(MockIndex {
                fail_serialize: None,
                destroyed: self.destroyed.clone(),
            })),
            Fault::PartialGraph => Ok(Box::new(MockIndex {
                fail_serialize: Some(LibraryErrorKind::DegenerateGraph),
                destroyed: self.destroyed.clone(),
            })),
        }
    }

    fn build_brute_force(
        &self,
        _dataset: &Dataset,
        _params: &BruteForceIndexParams,
    ) -> LibraryResult<Box<dyn NativeIndex>> {
        Ok(Box::new(MockIndex {
            fail_serialize: match self.fault {
                Fault::SerializeError => Some(LibraryErrorKind::Io),
                _ => None,
            },
            destroyed: self.destroyed.clone(),
        }))
    }

    fn temp_directory(&self) -> &Path {
        &self.temp_dir
    }
}

fn writer_with(
    storage: &Arc<MemoryStorage>,
    library: Arc<MockLibrary>,
    index_types: IndexTypeSet,
) -> pilum::vector::codec::PilumVectorsWriter {
    let config = WriterConfig {
        index_types,
        ..Default::default()
    };
    let format = PilumVectorsFormat::new(config, library).unwrap();
    let state = SegmentWriteState::new(storage.clone(), "_0");
    format.fields_writer(&state).unwrap()
}

#[test]
fn test_degenerate_message_falls_back_to_brute_force() {
    let storage = Arc::new(MemoryStorage::default());
    let library = Arc::new(MockLibrary::new(Fault::DegenerateMessage));
    let mut writer = writer_with(&storage, library.clone(), IndexTypeSet::FAST_GRAPH);

    let sink = writer
        .add_field(FieldInfo::new("v", 0, 2, VectorSimilarity::Euclidean))
        .unwrap();
    for doc in 0..6 {
        sink.add_value(doc, &[doc as f32, 1.0]).unwrap();
    }
    writer.flush(6, None).unwrap();
    writer.finish().unwrap();
    writer.close().unwrap();

    let meta = FieldMetaReader::read(storage.as_ref(), "_0", "", None).unwrap();
    let row = &meta.rows[0];
    assert_eq!(row.fast_graph.length, 0);
    assert_eq!(row.brute_force.length, 4);
    assert_eq!(row.cpu_graph.length, 0);
    assert_eq!(library.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_serialize_failure_is_fatal_and_leaves_streams_unsealed() {
    let storage = Arc::new(MemoryStorage::default());
    let library = Arc::new(MockLibrary::new(Fault::SerializeError));
    let mut writer = writer_with(&storage, library.clone(), IndexTypeSet::FAST_GRAPH_AND_BRUTE_FORCE);

    let first = writer
        .add_field(FieldInfo::new("ok", 0, 2, VectorSimilarity::Euclidean))
        .unwrap();
    let second = writer
        .add_field(FieldInfo::new("broken", 1, 2, VectorSimilarity::Euclidean))
        .unwrap();
    for doc in 0..3 {
        first.add_value(doc, &[doc as f32, 0.0]).unwrap();
        second.add_value(doc, &[0.0, doc as f32]).unwrap();
    }

    let err = writer.flush(3, None).unwrap_err();
    match err {
        PilumError::IndexBuild {
            field,
            kind,
            source,
        } => {
            assert_eq!(field, "ok");
            assert_eq!(kind, IndexKind::BruteForce);
            assert_eq!(source.kind, LibraryErrorKind::Io);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The graph and the failed brute-force index were both released.
    assert_eq!(library.destroyed.load(Ordering::SeqCst), 2);
    assert_eq!(writer.state(), WriterState::Failed);

    assert!(writer.flush(3, None).is_err());
    assert!(matches!(writer.finish(), Err(PilumError::InvalidState(_))));
    writer.close().unwrap();

    let err = FieldMetaReader::read(storage.as_ref(), "_0", "", None).unwrap_err();
    assert!(matches!(err, PilumError::CorruptIndex(_)));
}

#[test]
fn test_degenerate_graph_after_partial_write_is_fatal() {
    let storage = Arc::new(MemoryStorage::default());
    let library = Arc::new(MockLibrary::new(Fault::PartialGraph));
    let mut writer = writer_with(&storage, library.clone(), IndexTypeSet::FAST_GRAPH);

    let sink = writer
        .add_field(FieldInfo::new("v", 0, 2, VectorSimilarity::Euclidean))
        .unwrap();
    for doc in 0..4 {
        sink.add_value(doc, &[doc as f32, 1.0]).unwrap();
    }

    let err = writer.flush(4, None).unwrap_err();
    match err {
        PilumError::IndexBuild { kind, source, .. } => {
            assert_eq!(kind, IndexKind::FastGraph);
            assert!(source.is_degenerate_graph());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(library.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(writer.state(), WriterState::Failed);
    writer.close().unwrap();
}

#[test]
fn test_close_without_finish_releases_streams() {
    let storage = Arc::new(MemoryStorage::default());
    let library = Arc::new(MockLibrary::new(Fault::DegenerateMessage));
    let mut writer = writer_with(&storage, library, IndexTypeSet::BRUTE_FORCE);
    writer.close().unwrap();
    assert_eq!(writer.state(), WriterState::Closed);
    assert!(writer.flush(0, None).is_err());

    // Never finished, so never sealed.
    assert!(FieldMetaReader::read(storage.as_ref(), "_0", "", None).is_err());
}
