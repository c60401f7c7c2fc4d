//! Storage abstraction layer for Pilum.
//!
//! A segment's files are created through a [`Storage`] backend, which plays
//! the role of the host engine's segment directory. File and memory backends
//! can be swapped without touching the writer.
//!
//! # Example
//!
//! ```
//! use pilum::storage::{StorageFactory, StorageConfig};
//! use pilum::storage::memory::MemoryStorageConfig;
//!
//! # fn main() -> pilum::error::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))?;
//! assert!(!storage.file_exists("_0.pvm"));
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};
use std::sync::Arc;

use crate::error::{PilumError, Result};

pub mod file;
pub mod memory;
pub mod structured;

/// The directory a segment's files are written to.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any existing content.
    ///
    /// # Example
    ///
    /// ```
    /// use pilum::storage::memory::{MemoryStorage, MemoryStorageConfig};
    /// use pilum::storage::Storage;
    /// use std::io::Write;
    ///
    /// # fn main() -> pilum::error::Result<()> {
    /// let storage = MemoryStorage::new(MemoryStorageConfig::default());
    ///
    /// let mut output = storage.create_output("index.bin")?;
    /// output.write_all(b"Hello, World!")?;
    /// output.close()?;
    ///
    /// assert!(storage.file_exists("index.bin"));
    /// # Ok(())
    /// # }
    /// ```
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Sync all pending writes.
    fn sync(&self) -> Result<()>;
}

/// A readable, seekable file handle.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Total size of the file in bytes.
    fn size(&self) -> Result<u64>;

    /// Close the input.
    fn close(&mut self) -> Result<()>;
}

/// An append-only file handle.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered data and sync it to the backing medium.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Number of bytes written so far.
    fn position(&self) -> Result<u64>;

    /// Close the output. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&self) -> Result<u64> {
        self.as_ref().position()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Directory on the local file system.
    File(file::FileStorageConfig),

    /// In-process memory.
    Memory(memory::MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(memory::MemoryStorageConfig::default())
    }
}

/// Builds a backend from a [`StorageConfig`].
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend from its configuration.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::Memory(mem_config) => {
                let storage = memory::MemoryStorage::new(mem_config);
                Ok(Arc::new(storage))
            }
            StorageConfig::File(file_config) => {
                let storage = file::FileStorage::new(file_config)?;
                Ok(Arc::new(storage))
            }
        }
    }
}

/// Storage-specific error conditions.
#[derive(Debug, Clone)]
pub enum StorageError {
    FileNotFound(String),

    IoError(String),

    OutputClosed(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::OutputClosed(name) => write!(f, "Output is closed: {name}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for PilumError {
    fn from(err: StorageError) -> Self {
        PilumError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::FileStorageConfig;
    use crate::storage::memory::MemoryStorageConfig;

    fn write_segment_files(storage: &dyn Storage) {
        for (name, bytes) in [("_0.pvm", &b"meta"[..]), ("_0.pvi", &b"index-bytes"[..])] {
            let mut output = storage.create_output(name).unwrap();
            output.write_all(bytes).unwrap();
            assert_eq!(output.position().unwrap(), bytes.len() as u64);
            output.close().unwrap();
        }
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("_0.pvm".to_string());
        assert_eq!(err.to_string(), "File not found: _0.pvm");

        let err = StorageError::OutputClosed("_0.pvi".to_string());
        assert_eq!(err.to_string(), "Output is closed: _0.pvi");

        let err: PilumError = StorageError::IoError("disk full".to_string()).into();
        assert!(matches!(err, PilumError::Storage(_)));
    }

    #[test]
    fn test_memory_backend_from_factory() {
        let storage = StorageFactory::create(StorageConfig::default()).unwrap();
        write_segment_files(storage.as_ref());

        assert_eq!(storage.list_files().unwrap(), vec!["_0.pvi", "_0.pvm"]);
        assert_eq!(storage.file_size("_0.pvi").unwrap(), 11);
    }

    #[test]
    fn test_file_backend_from_factory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::File(FileStorageConfig::new(temp_dir.path()));
        let storage = StorageFactory::create(config).unwrap();
        write_segment_files(storage.as_ref());

        let mut input = storage.open_input("_0.pvi").unwrap();
        assert_eq!(input.size().unwrap(), 11);
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"index-bytes");

        storage.delete_file("_0.pvi").unwrap();
        storage.delete_file("_0.pvi").unwrap();
        assert!(!storage.file_exists("_0.pvi"));
        assert!(storage.open_input("_0.pvi").is_err());
    }

    #[test]
    fn test_memory_config_capacity() {
        let StorageConfig::Memory(config) = StorageConfig::default() else {
            panic!("expected the memory backend");
        };
        assert_eq!(config, MemoryStorageConfig::default());
    }
}
