//! # Pilum
//!
//! Segment vector index writer for accelerated nearest-neighbor indexes.
//!
//! ## Features
//!
//! - Per-field buffering of float vectors
//! - Fast-graph, brute-force and CPU-graph index builds
//! - Automatic degradation when a graph cannot be built
//! - Sorted flushes and merges across segments
//! - A checksummed, seekable on-disk layout
//! - Pluggable storage backends

pub mod cli;
pub mod error;
pub mod storage;
pub mod util;
pub mod vector;

pub mod prelude {
    pub use crate::error::{PilumError, Result};
    pub use crate::storage::Storage;
    pub use crate::vector::codec::{PilumVectorsFormat, PilumVectorsWriter, SegmentWriteState};
    pub use crate::vector::config::WriterConfig;
    pub use crate::vector::field::{FieldInfo, VectorEncoding};
    pub use crate::vector::index::{IndexKind, IndexTypeSet};
    pub use crate::vector::similarity::VectorSimilarity;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
