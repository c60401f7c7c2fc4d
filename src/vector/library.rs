//! Capability interface of the native index library.
//!
//! A library builds an index from a [`Dataset`], the index is serialised into
//! a byte sink and its resources are released immediately afterwards. Failures
//! carry a [`LibraryErrorKind`] so that callers can recognise the recoverable
//! degenerate-graph condition without matching on message text. Adapters over
//! libraries that only report messages use [`classify_library_message`].

use std::fmt;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::vector::dataset::Dataset;
use crate::vector::index::params::{BruteForceIndexParams, GraphIndexParams};

pub mod reference;

/// Message fragment reported when the initial kNN graph cannot be pruned.
pub const DEGENERATE_GRAPH_MESSAGE: &str =
    "the initial kNN graph contains too many invalid or duplicated neighbor nodes";

/// Classification of a library failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryErrorKind {
    /// Too many invalid or duplicated neighbour candidates to build a graph.
    DegenerateGraph,
    /// The dataset or parameters were rejected.
    InvalidInput,
    /// The library failed internally.
    Internal,
    /// Reading or writing index bytes failed.
    Io,
    /// The index does not support the requested operation.
    Unsupported,
}

impl fmt::Display for LibraryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LibraryErrorKind::DegenerateGraph => "degenerate graph",
            LibraryErrorKind::InvalidInput => "invalid input",
            LibraryErrorKind::Internal => "internal",
            LibraryErrorKind::Io => "io",
            LibraryErrorKind::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A failure reported by an index library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct LibraryError {
    pub kind: LibraryErrorKind,
    pub message: String,
}

impl LibraryError {
    pub fn new<S: Into<String>>(kind: LibraryErrorKind, message: S) -> Self {
        LibraryError {
            kind,
            message: message.into(),
        }
    }

    /// Build an error from a bare library message, classifying it.
    pub fn from_message<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        LibraryError {
            kind: classify_library_message(&message),
            message,
        }
    }

    pub fn is_degenerate_graph(&self) -> bool {
        self.kind == LibraryErrorKind::DegenerateGraph
    }
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::new(LibraryErrorKind::Io, err.to_string())
    }
}

/// Result type of library calls.
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

/// Map a library message onto an error kind.
pub fn classify_library_message(message: &str) -> LibraryErrorKind {
    if message.contains(DEGENERATE_GRAPH_MESSAGE) {
        LibraryErrorKind::DegenerateGraph
    } else {
        LibraryErrorKind::Internal
    }
}

/// An index library able to build graph and brute-force indexes.
pub trait IndexLibrary: Send + Sync + fmt::Debug {
    /// Build a graph index over `dataset`.
    fn build_graph(
        &self,
        dataset: &Dataset,
        params: &GraphIndexParams,
    ) -> LibraryResult<Box<dyn NativeIndex>>;

    /// Build an exact brute-force index over `dataset`.
    fn build_brute_force(
        &self,
        dataset: &Dataset,
        params: &BruteForceIndexParams,
    ) -> LibraryResult<Box<dyn NativeIndex>>;

    /// Directory for scratch files used during serialisation.
    fn temp_directory(&self) -> &Path;
}

/// A built index held by the library.
pub trait NativeIndex: Send + fmt::Debug {
    /// Serialise the index into `sink`, optionally staging through `scratch`.
    fn serialize(&mut self, sink: &mut dyn Write, scratch: Option<&Path>) -> LibraryResult<()>;

    /// Serialise the index in the CPU-searchable graph layout.
    fn serialize_cpu_graph(
        &mut self,
        _sink: &mut dyn Write,
        _scratch: Option<&Path>,
    ) -> LibraryResult<()> {
        Err(LibraryError::new(
            LibraryErrorKind::Unsupported,
            "index cannot be serialized as a CPU graph",
        ))
    }

    /// Release the resources held by the index.
    fn destroy(&mut self) -> LibraryResult<()>;
}

/// Owns a [`NativeIndex`] and destroys it exactly once.
///
/// Serialising through the handle releases the index afterwards whether or
/// not serialisation succeeded. Dropping an unreleased handle also releases.
#[derive(Debug)]
pub struct IndexHandle {
    index: Option<Box<dyn NativeIndex>>,
}

impl IndexHandle {
    pub fn new(index: Box<dyn NativeIndex>) -> Self {
        IndexHandle { index: Some(index) }
    }

    /// Serialise into `sink`, then release.
    pub fn serialize_and_release(
        mut self,
        sink: &mut dyn Write,
        scratch: Option<&Path>,
    ) -> LibraryResult<()> {
        let result = match self.index.as_mut() {
            Some(index) => index.serialize(sink, scratch),
            None => Err(released()),
        };
        let released = self.release();
        result.and(released)
    }

    /// Serialise as a CPU graph into `sink`, then release.
    pub fn serialize_cpu_graph_and_release(
        mut self,
        sink: &mut dyn Write,
        scratch: Option<&Path>,
    ) -> LibraryResult<()> {
        let result = match self.index.as_mut() {
            Some(index) => index.serialize_cpu_graph(sink, scratch),
            None => Err(released()),
        };
        let released = self.release();
        result.and(released)
    }

    /// Release the index now. Releasing twice is a no-op.
    pub fn release(&mut self) -> LibraryResult<()> {
        match self.index.take() {
            Some(mut index) => index.destroy(),
            None => Ok(()),
        }
    }
}

fn released() -> LibraryError {
    LibraryError::new(LibraryErrorKind::InvalidInput, "index already released")
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("failed to release native index: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingIndex {
        destroyed: Arc<AtomicUsize>,
        fail_serialize: bool,
    }

    impl NativeIndex for CountingIndex {
        fn serialize(&mut self, sink: &mut dyn Write, _scratch: Option<&Path>) -> LibraryResult<()> {
            if self.fail_serialize {
                return Err(LibraryError::new(LibraryErrorKind::Internal, "boom"));
            }
            sink.write_all(b"idx")?;
            Ok(())
        }

        fn destroy(&mut self) -> LibraryResult<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_handle(fail_serialize: bool) -> (IndexHandle, Arc<AtomicUsize>) {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let index = CountingIndex {
            destroyed: destroyed.clone(),
            fail_serialize,
        };
        (IndexHandle::new(Box::new(index)), destroyed)
    }

    #[test]
    fn test_classify_library_message() {
        let message =
            format!("Could not generate an intermediate graph because {DEGENERATE_GRAPH_MESSAGE}.");
        assert_eq!(
            classify_library_message(&message),
            LibraryErrorKind::DegenerateGraph
        );
        assert_eq!(
            classify_library_message("out of device memory"),
            LibraryErrorKind::Internal
        );
        assert!(LibraryError::from_message(message).is_degenerate_graph());
    }

    #[test]
    fn test_handle_releases_after_serialize() {
        let (handle, destroyed) = counting_handle(false);
        let mut sink = Vec::new();
        handle.serialize_and_release(&mut sink, None).unwrap();

        assert_eq!(sink, b"idx");
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_releases_after_failed_serialize() {
        let (handle, destroyed) = counting_handle(true);
        let err = handle.serialize_and_release(&mut Vec::new(), None).unwrap_err();

        assert_eq!(err.kind, LibraryErrorKind::Internal);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_releases_on_drop_once() {
        let (mut handle, destroyed) = counting_handle(false);
        handle.release().unwrap();
        drop(handle);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        let (handle, destroyed) = counting_handle(false);
        drop(handle);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cpu_graph_unsupported_by_default() {
        let (handle, destroyed) = counting_handle(false);
        let err = handle
            .serialize_cpu_graph_and_release(&mut Vec::new(), None)
            .unwrap_err();
        assert_eq!(err.kind, LibraryErrorKind::Unsupported);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
