//! Command implementations for the Pilum CLI.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{PilumError, Result};
use crate::storage::file::FileStorageConfig;
use crate::storage::{Storage, StorageConfig, StorageFactory};
use crate::vector::codec::SegmentWriteState;
use crate::vector::codec::format::{
    FieldMetaReader, INDEX_EXT, META_EXT, PilumVectorsFormat, segment_file_name,
};
use crate::vector::config::WriterConfig;
use crate::vector::field::{FieldInfo, VectorEncoding};
use crate::vector::library::reference::ReferenceLibrary;
use crate::vector::similarity::VectorSimilarity;

/// Vectors of one build, as read from the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorsInput {
    pub fields: Vec<FieldInput>,
}

/// One field of the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldInput {
    pub name: String,
    pub number: i32,
    pub dimension: usize,
    #[serde(default)]
    pub similarity: VectorSimilarity,
    #[serde(default)]
    pub encoding: VectorEncoding,
    #[serde(default)]
    pub vectors: Vec<DocVector>,
}

/// The vector of one document.
#[derive(Debug, Clone, Deserialize)]
pub struct DocVector {
    pub doc: u32,
    pub values: Vec<f32>,
}

impl VectorsInput {
    /// Load an input file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PilumError::invalid_argument(format!("failed to read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// One past the largest document id.
    pub fn max_doc(&self) -> u32 {
        self.fields
            .iter()
            .flat_map(|f| f.vectors.iter().map(|v| v.doc + 1))
            .max()
            .unwrap_or(0)
    }
}

/// Execute a CLI command.
pub fn execute_command(args: PilumArgs) -> Result<()> {
    match &args.command {
        Command::Build(build_args) => build_segment(build_args.clone(), &args),
        Command::Inspect(inspect_args) => inspect_segment(inspect_args.clone(), &args),
    }
}

/// Resolve the writer configuration of a build.
pub fn load_config(args: &BuildArgs) -> Result<WriterConfig> {
    let mut config = match &args.config {
        Some(path) => WriterConfig::from_json_file(path)?,
        None => WriterConfig::default(),
    };
    if let Some(index_types) = args.index_types {
        config.index_types = index_types;
    }
    if let Some(threads) = args.threads {
        config.writer_threads = threads;
    }
    config.validate()?;
    Ok(config)
}

/// Write a segment from an input file.
fn build_segment(args: BuildArgs, cli_args: &PilumArgs) -> Result<()> {
    let start_time = Instant::now();
    let config = load_config(&args)?;
    let input = VectorsInput::from_file(&args.input)?;

    fs::create_dir_all(&args.output)?;
    let storage =
        StorageFactory::create(StorageConfig::File(FileStorageConfig::new(&args.output)))?;

    let temp_dir = args.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
    let library = Arc::new(ReferenceLibrary::new(temp_dir));
    let format = PilumVectorsFormat::new(config.clone(), library)?;

    let state = SegmentWriteState::new(Arc::clone(&storage), args.segment.clone())
        .with_suffix(args.suffix.clone());
    let index_size = write_segment(&format, &state, &input)?;

    let meta = FieldMetaReader::read(
        storage.as_ref(),
        &state.segment_name,
        &state.segment_suffix,
        Some(&state.segment_id),
    )?;

    output_result(
        "Segment written successfully",
        &BuildResult {
            segment: args.segment.clone(),
            meta_file: state.file_name(META_EXT),
            index_file: state.file_name(INDEX_EXT),
            index_size_bytes: index_size,
            index_types: config.index_types.to_string(),
            duration_ms: start_time.elapsed().as_millis() as u64,
            fields: meta.rows,
        },
        cli_args,
    )
}

/// Register, fill, flush and seal every field of `input` into one segment.
///
/// Returns the size of the index blob.
pub fn write_segment(
    format: &PilumVectorsFormat,
    state: &SegmentWriteState,
    input: &VectorsInput,
) -> Result<u64> {
    let mut writer = format.fields_writer(state)?;
    for field in &input.fields {
        let info = FieldInfo::new(&field.name, field.number, field.dimension, field.similarity)
            .with_encoding(field.encoding);
        let sink = writer.add_field(info)?;

        let mut vectors: Vec<&DocVector> = field.vectors.iter().collect();
        vectors.sort_by_key(|v| v.doc);
        for vector in vectors {
            sink.add_value(vector.doc, &vector.values)?;
        }
        log::info!("buffered {} vectors of field '{}'", sink.len(), field.name);
    }

    writer.flush(input.max_doc(), None)?;
    writer.finish()?;
    writer.close()?;

    FieldMetaReader::verify_index(
        state.storage.as_ref(),
        &state.segment_name,
        &state.segment_suffix,
        &state.segment_id,
    )
}

/// Print the metadata rows of a segment.
fn inspect_segment(args: InspectArgs, cli_args: &PilumArgs) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(PilumError::invalid_argument(format!(
            "{} is not a directory",
            args.dir.display()
        )));
    }
    let storage =
        StorageFactory::create(StorageConfig::File(FileStorageConfig::new(&args.dir)))?;
    let index_file = segment_file_name(&args.segment, &args.suffix, INDEX_EXT);
    if !storage.file_exists(&index_file) {
        return Err(PilumError::storage(format!("{index_file} not found")));
    }

    let meta = FieldMetaReader::read(storage.as_ref(), &args.segment, &args.suffix, None)?;
    let index_size = FieldMetaReader::verify_index(
        storage.as_ref(),
        &args.segment,
        &args.suffix,
        &meta.segment_id,
    )?;

    output_result(
        "Segment verified successfully",
        &InspectResult {
            segment: args.segment.clone(),
            segment_id: uuid::Uuid::from_bytes(meta.segment_id).to_string(),
            version: meta.version,
            index_size_bytes: index_size,
            fields: meta.rows,
        },
        cli_args,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::vector::index::kind::IndexTypeSet;

    const INPUT: &str = r#"{
        "fields": [
            {"name": "title", "number": 0, "dimension": 2, "similarity": "cosine",
             "vectors": [{"doc": 2, "values": [1.0, 0.0]}, {"doc": 0, "values": [0.0, 1.0]},
                         {"doc": 1, "values": [0.5, 0.5]}]},
            {"name": "empty", "number": 1, "dimension": 4}
        ]
    }"#;

    fn build_args(config: Option<std::path::PathBuf>) -> BuildArgs {
        BuildArgs {
            input: "vectors.json".into(),
            output: "out".into(),
            segment: "_0".to_string(),
            suffix: String::new(),
            index_types: Some(IndexTypeSet::BRUTE_FORCE),
            config,
            threads: Some(2),
            temp_dir: None,
        }
    }

    #[test]
    fn test_input_parsing() {
        let input: VectorsInput = serde_json::from_str(INPUT).unwrap();
        assert_eq!(input.fields.len(), 2);
        assert_eq!(input.fields[0].similarity, VectorSimilarity::Cosine);
        assert_eq!(input.fields[1].encoding, VectorEncoding::Float32);
        assert!(input.fields[1].vectors.is_empty());
        assert_eq!(input.max_doc(), 3);
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let config = load_config(&build_args(None)).unwrap();
        assert_eq!(config.index_types, IndexTypeSet::BRUTE_FORCE);
        assert_eq!(config.writer_threads, 2);

        let mut args = build_args(None);
        args.threads = Some(0);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_write_segment() {
        let input: VectorsInput = serde_json::from_str(INPUT).unwrap();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
        let config = load_config(&build_args(None)).unwrap();
        let library = Arc::new(ReferenceLibrary::default());
        let format = PilumVectorsFormat::new(config, library).unwrap();
        let state = SegmentWriteState::new(Arc::clone(&storage), "_0");

        let size = write_segment(&format, &state, &input).unwrap();
        assert_eq!(size, storage.file_size("_0.pvi").unwrap());

        let meta =
            FieldMetaReader::read(storage.as_ref(), "_0", "", Some(&state.segment_id)).unwrap();
        assert_eq!(meta.rows.len(), 2);
        assert_eq!(meta.rows[0].count, 3);
        assert!(meta.rows[0].brute_force.is_present());
        assert_eq!(meta.rows[1].count, 0);
        assert_eq!(meta.rows[1].brute_force.offset, meta.rows[0].brute_force.end());
    }
}
