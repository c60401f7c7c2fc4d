//! Vector index writing for segments.
//!
//! # Module Structure
//!
//! - `field`: field descriptions and per-field vector buffers
//! - `dataset`: contiguous vector datasets fed to index builds
//! - `sort`: document reordering applied by sorted flushes
//! - `merge`: merged vector values across segments
//! - `index`: index kinds, build parameters, degradation policy and build strategies
//! - `library`: the native index library interface and a reference implementation
//! - `codec`: the segment file format and the segment writer
//! - `config`: writer configuration
//! - `info`: diagnostic message sinks

pub mod codec;
pub mod config;
pub mod dataset;
pub mod field;
pub mod index;
pub mod info;
pub mod library;
pub mod merge;
pub mod similarity;
pub mod sort;

pub use self::codec::{PilumVectorsFormat, PilumVectorsWriter, SegmentWriteState};
pub use self::config::WriterConfig;
pub use self::dataset::Dataset;
pub use self::field::{FieldInfo, VectorEncoding};
pub use self::index::{IndexKind, IndexTypeSet};
pub use self::similarity::VectorSimilarity;
