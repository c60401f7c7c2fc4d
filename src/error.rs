//! Error types for the Pilum library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`PilumError`] enum. Failures reported by an index library are carried as
//! a structured [`LibraryError`] so callers can tell the single recoverable
//! library condition apart from fatal ones without inspecting messages.
//!
//! # Examples
//!
//! ```
//! use pilum::error::{PilumError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PilumError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::vector::index::kind::IndexKind;
use crate::vector::library::LibraryError;

/// The main error type for Pilum operations.
#[derive(Error, Debug)]
pub enum PilumError {
    /// I/O errors (file operations, scratch files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A field was registered with a vector encoding the writer cannot index.
    #[error("Unsupported encoding: expected float32, got: {0}")]
    UnsupportedEncoding(String),

    /// A graph build was invoked on a dataset below its minimum size.
    #[error("Insufficient data: {actual} vectors, less than min [{required}] required")]
    InsufficientData { required: usize, actual: usize },

    /// The index library failed to build or serialize a representation.
    #[error("Index build error for field '{field}' ({kind}): {source}")]
    IndexBuild {
        field: String,
        kind: IndexKind,
        #[source]
        source: LibraryError,
    },

    /// Lifecycle misuse (e.g. finishing a writer twice).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Vector dimension mismatch.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted stream failed header, footer or checksum validation.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with PilumError.
pub type Result<T> = std::result::Result<T, PilumError>;

impl PilumError {
    /// Create a new unsupported encoding error.
    pub fn unsupported_encoding<S: Into<String>>(encoding: S) -> Self {
        PilumError::UnsupportedEncoding(encoding.into())
    }

    /// Create a new insufficient data error.
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        PilumError::InsufficientData { required, actual }
    }

    /// Create a new index build error.
    pub fn index_build<S: Into<String>>(field: S, kind: IndexKind, source: LibraryError) -> Self {
        PilumError::IndexBuild {
            field: field.into(),
            kind,
            source,
        }
    }

    /// Create a new invalid state error.
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        PilumError::InvalidState(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PilumError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PilumError::InvalidConfig(msg.into())
    }

    /// Create a new corrupt index error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        PilumError::CorruptIndex(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PilumError::Storage(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(format!("Internal error: {}", msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::library::LibraryErrorKind;

    #[test]
    fn test_error_construction() {
        let error = PilumError::unsupported_encoding("byte");
        assert_eq!(
            error.to_string(),
            "Unsupported encoding: expected float32, got: byte"
        );

        let error = PilumError::insufficient_data(2, 1);
        assert_eq!(
            error.to_string(),
            "Insufficient data: 1 vectors, less than min [2] required"
        );

        let error = PilumError::invalid_state("already finished");
        assert_eq!(error.to_string(), "Invalid state: already finished");
    }

    #[test]
    fn test_index_build_error_keeps_source() {
        let source = LibraryError::new(LibraryErrorKind::Internal, "device lost");
        let error = PilumError::index_build("embedding", IndexKind::FastGraph, source);

        assert!(error.to_string().contains("embedding"));
        assert!(error.to_string().contains("fast-graph"));
        let source = std::error::Error::source(&error).unwrap();
        assert!(source.to_string().contains("device lost"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let pilum_error = PilumError::from(io_error);

        match pilum_error {
            PilumError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }
}
