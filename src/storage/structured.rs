//! Structured file I/O for binary data serialization.
//!
//! [`StructWriter`] and [`StructReader`] wrap a storage handle with
//! little-endian primitives, variable-length integers and a running CRC32
//! over every byte that passes through them. On top of the primitives they
//! provide the index header and footer framing shared by all segment files:
//!
//! ```text
//! header: u32 CODEC_MAGIC | string codec | u32 version | [u8; 16] segment id | u8 len + suffix
//! footer: u32 FOOTER_MAGIC | u32 algorithm (0) | u64 crc32 of all preceding bytes
//! ```

use std::io::Write;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{PilumError, Result};
use crate::storage::{StorageInput, StorageOutput};
use crate::util::varint::{decode_u64, encode_u64};

/// Magic number opening every index header.
pub const CODEC_MAGIC: u32 = 0x3fd7_6c17;

/// Magic number opening every footer.
pub const FOOTER_MAGIC: u32 = !CODEC_MAGIC;

/// Length of a segment id in bytes.
pub const ID_LENGTH: usize = 16;

/// Length of the footer in bytes.
pub const FOOTER_LENGTH: u64 = 16;

const MAX_VARINT_LEN: usize = 10;

/// Fields of a decoded index header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub segment_id: [u8; ID_LENGTH],
}

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: Hasher,
    position: u64,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: Hasher::new(),
            position: 0,
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.update_checksum(&[value]);
        Ok(())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.update_checksum(&value.to_le_bytes());
        Ok(())
    }

    /// Write an i32 value (little-endian).
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<LittleEndian>(value)?;
        self.update_checksum(&value.to_le_bytes());
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.update_checksum(&value.to_le_bytes());
        Ok(())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let encoded = encode_u64(value);
        self.write_raw(&encoded)
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.write_varint(bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.update_checksum(value);
        Ok(())
    }

    /// Write the index header identifying codec, version and segment.
    pub fn write_index_header(
        &mut self,
        codec: &str,
        version: u32,
        segment_id: &[u8; ID_LENGTH],
        suffix: &str,
    ) -> Result<()> {
        if suffix.len() > u8::MAX as usize {
            return Err(PilumError::invalid_argument(format!(
                "segment suffix must be at most 255 bytes, got {}",
                suffix.len()
            )));
        }
        self.write_u32(CODEC_MAGIC)?;
        self.write_string(codec)?;
        self.write_u32(version)?;
        self.write_raw(segment_id)?;
        self.write_u8(suffix.len() as u8)?;
        self.write_raw(suffix.as_bytes())
    }

    /// Write the footer sealing the stream with the running checksum.
    pub fn write_footer(&mut self) -> Result<()> {
        self.write_u32(FOOTER_MAGIC)?;
        self.write_u32(0)?;
        let checksum = self.checksum() as u64;
        self.writer.write_u64::<LittleEndian>(checksum)?;
        self.position += 8;
        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get current checksum.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn update_checksum(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.position += data.len() as u64;
    }

    /// Flush and close the underlying output. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.close()
    }
}

impl<W: StorageOutput> Write for StructWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.update_checksum(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl<W: StorageOutput> std::fmt::Debug for StructWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructWriter")
            .field("writer", &self.writer)
            .field("position", &self.position)
            .finish()
    }
}

/// A structured file reader for binary data.
pub struct StructReader<R: StorageInput> {
    reader: R,
    hasher: Hasher,
    position: u64,
    file_size: u64,
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured file reader.
    pub fn new(reader: R) -> Result<Self> {
        let file_size = reader.size()?;
        Ok(StructReader {
            reader,
            hasher: Hasher::new(),
            position: 0,
            file_size,
        })
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8()?;
        self.update_checksum(&[value]);
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.update_checksum(&value.to_le_bytes());
        Ok(value)
    }

    /// Read an i32 value (little-endian).
    pub fn read_i32(&mut self) -> Result<i32> {
        let value = self.reader.read_i32::<LittleEndian>()?;
        self.update_checksum(&value.to_le_bytes());
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut bytes = Vec::with_capacity(MAX_VARINT_LEN);
        loop {
            let byte = self.reader.read_u8()?;
            bytes.push(byte);
            if byte & 0x80 == 0 {
                break;
            }
            if bytes.len() >= MAX_VARINT_LEN {
                return Err(PilumError::corrupt("varint exceeds 10 bytes"));
            }
        }

        let (value, _) = decode_u64(&bytes)?;
        self.update_checksum(&bytes);
        Ok(value)
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_varint()? as usize;
        let bytes = self.read_raw(length)?;

        String::from_utf8(bytes).map_err(|e| PilumError::corrupt(format!("Invalid UTF-8: {e}")))
    }

    /// Read exact number of raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<Vec<u8>> {
        if self.position + length as u64 > self.file_size {
            return Err(PilumError::corrupt(format!(
                "read of {length} bytes at {} past end of file ({})",
                self.position, self.file_size
            )));
        }
        let mut bytes = vec![0u8; length];
        self.reader.read_exact(&mut bytes)?;
        self.update_checksum(&bytes);
        Ok(bytes)
    }

    /// Read an index header written for `codec`, returning it without
    /// checking the segment id.
    pub fn read_index_header(
        &mut self,
        codec: &str,
        min_version: u32,
        max_version: u32,
        suffix: &str,
    ) -> Result<IndexHeader> {
        let magic = self.read_u32()?;
        if magic != CODEC_MAGIC {
            return Err(PilumError::corrupt(format!(
                "codec header mismatch: actual header={magic:#x} vs expected header={CODEC_MAGIC:#x}"
            )));
        }
        let actual_codec = self.read_string()?;
        if actual_codec != codec {
            return Err(PilumError::corrupt(format!(
                "codec mismatch: actual codec={actual_codec} vs expected codec={codec}"
            )));
        }
        let version = self.read_u32()?;
        if version < min_version || version > max_version {
            return Err(PilumError::corrupt(format!(
                "format version {version} not in [{min_version}, {max_version}]"
            )));
        }
        let mut segment_id = [0u8; ID_LENGTH];
        segment_id.copy_from_slice(&self.read_raw(ID_LENGTH)?);
        let suffix_len = self.read_u8()? as usize;
        let actual_suffix = self.read_raw(suffix_len)?;
        if actual_suffix != suffix.as_bytes() {
            return Err(PilumError::corrupt(format!(
                "segment suffix mismatch: expected '{suffix}'"
            )));
        }
        Ok(IndexHeader {
            version,
            segment_id,
        })
    }

    /// Validate an index header, returning the stored version.
    pub fn check_index_header(
        &mut self,
        codec: &str,
        min_version: u32,
        max_version: u32,
        segment_id: &[u8; ID_LENGTH],
        suffix: &str,
    ) -> Result<u32> {
        let header = self.read_index_header(codec, min_version, max_version, suffix)?;
        if &header.segment_id != segment_id {
            return Err(PilumError::corrupt("segment id mismatch"));
        }
        Ok(header.version)
    }

    /// Validate the footer and the checksum of everything read so far.
    ///
    /// The footer must be exactly the last [`FOOTER_LENGTH`] bytes.
    pub fn check_footer(&mut self) -> Result<()> {
        let remaining = self.file_size.saturating_sub(self.position);
        if remaining != FOOTER_LENGTH {
            return Err(PilumError::corrupt(format!(
                "expected {FOOTER_LENGTH} footer bytes, found {remaining}"
            )));
        }
        let magic = self.read_u32()?;
        if magic != FOOTER_MAGIC {
            return Err(PilumError::corrupt(format!(
                "codec footer mismatch: actual footer={magic:#x} vs expected footer={FOOTER_MAGIC:#x}"
            )));
        }
        let algorithm = self.read_u32()?;
        if algorithm != 0 {
            return Err(PilumError::corrupt(format!(
                "unknown checksum algorithm {algorithm}"
            )));
        }
        let expected = self.checksum() as u64;
        let actual = self.reader.read_u64::<LittleEndian>()?;
        self.position += 8;
        if actual != expected {
            return Err(PilumError::corrupt(format!(
                "checksum failed: actual={actual:#x} vs expected={expected:#x}"
            )));
        }
        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get file size.
    pub fn size(&self) -> u64 {
        self.file_size
    }

    /// Get current checksum.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn update_checksum(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.position += data.len() as u64;
    }

    /// Close the reader.
    pub fn close(mut self) -> Result<()> {
        self.reader.close()
    }
}
