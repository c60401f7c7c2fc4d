//! Pure-Rust reference implementation of [`IndexLibrary`].
//!
//! Graphs are exact kNN graphs pruned to the requested degree; candidate
//! distances are squared L2. Work is spread over a rayon thread pool sized by
//! the writer thread count. The serialised layouts are:
//!
//! ```text
//! graph:       "PGRF" | u32 version | u32 size | u32 dim | u32 degree | f32 vectors | u32 adjacency (padded)
//! cpu graph:   "PHNS" | u32 version | u32 size | u32 dim | u32 max degree | u32 entry point
//!              | per node: u32 count + u32 neighbours | f32 vectors
//! brute force: "PBFI" | u32 version | u32 size | u32 dim | f32 vectors | f32 squared norms
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;

use crate::vector::dataset::Dataset;
use crate::vector::index::params::{BruteForceIndexParams, GraphIndexParams};
use crate::vector::library::{
    DEGENERATE_GRAPH_MESSAGE, IndexLibrary, LibraryError, LibraryErrorKind, LibraryResult,
    NativeIndex,
};

pub const GRAPH_MAGIC: &[u8; 4] = b"PGRF";
pub const CPU_GRAPH_MAGIC: &[u8; 4] = b"PHNS";
pub const BRUTE_FORCE_MAGIC: &[u8; 4] = b"PBFI";

const FORMAT_VERSION: u32 = 1;
const NO_NEIGHBOR: u32 = u32::MAX;

/// Reference index library running on the CPU.
#[derive(Debug, Clone)]
pub struct ReferenceLibrary {
    temp_dir: PathBuf,
}

impl ReferenceLibrary {
    /// Create a library that stages scratch files under `temp_dir`.
    pub fn new<P: Into<PathBuf>>(temp_dir: P) -> Self {
        ReferenceLibrary {
            temp_dir: temp_dir.into(),
        }
    }
}

impl Default for ReferenceLibrary {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

fn thread_pool(threads: usize) -> LibraryResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|e| LibraryError::new(LibraryErrorKind::Internal, e.to_string()))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest `k` finite candidates of `ord`, and the number of non-finite ones.
fn candidate_list(dataset: &Dataset, ord: usize, k: usize) -> (Vec<u32>, usize) {
    let Some(query) = dataset.vector(ord) else {
        return (Vec::new(), 0);
    };
    let mut invalid = 0;
    let mut candidates: Vec<(f32, u32)> = Vec::with_capacity(dataset.size());
    for (other, vector) in dataset.iter().enumerate() {
        if other == ord {
            continue;
        }
        let distance = squared_l2(query, vector);
        if distance.is_finite() {
            candidates.push((distance, other as u32));
        } else {
            invalid += 1;
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    candidates.truncate(k);
    (candidates.into_iter().map(|(_, id)| id).collect(), invalid)
}

impl IndexLibrary for ReferenceLibrary {
    fn build_graph(
        &self,
        dataset: &Dataset,
        params: &GraphIndexParams,
    ) -> LibraryResult<Box<dyn NativeIndex>> {
        let size = dataset.size();
        if size < 2 {
            return Err(LibraryError::new(
                LibraryErrorKind::InvalidInput,
                format!("graph index needs at least 2 vectors, got {size}"),
            ));
        }
        let (intermediate, degree) = params.effective_degrees(size);

        let pool = thread_pool(params.writer_threads)?;
        let lists: Vec<(Vec<u32>, usize)> = pool.install(|| {
            (0..size)
                .into_par_iter()
                .map(|ord| candidate_list(dataset, ord, intermediate))
                .collect()
        });

        let invalid: usize = lists.iter().map(|(_, invalid)| invalid).sum();
        let total = size * (size - 1);
        if invalid * 2 > total {
            return Err(LibraryError::new(
                LibraryErrorKind::DegenerateGraph,
                format!(
                    "Could not generate an intermediate graph because {DEGENERATE_GRAPH_MESSAGE} \
                     ({invalid} of {total} candidate distances are not finite)"
                ),
            ));
        }

        let graph = lists
            .into_iter()
            .map(|(mut neighbors, _)| {
                neighbors.truncate(degree);
                neighbors
            })
            .collect();

        log::debug!(
            "built reference graph: size={size}, intermediate_degree={intermediate}, degree={degree}"
        );

        Ok(Box::new(ReferenceGraphIndex {
            dimension: dataset.dimension(),
            degree,
            data: dataset.as_slice().to_vec(),
            graph,
            destroyed: false,
        }))
    }

    fn build_brute_force(
        &self,
        dataset: &Dataset,
        params: &BruteForceIndexParams,
    ) -> LibraryResult<Box<dyn NativeIndex>> {
        let dimension = dataset.dimension();
        let norms = if dimension == 0 {
            vec![0.0; dataset.size()]
        } else {
            let pool = thread_pool(params.writer_threads)?;
            pool.install(|| {
                dataset
                    .as_slice()
                    .par_chunks(dimension)
                    .map(|v| v.iter().map(|x| x * x).sum::<f32>())
                    .collect()
            })
        };

        Ok(Box::new(ReferenceBruteForceIndex {
            dimension,
            size: dataset.size(),
            data: dataset.as_slice().to_vec(),
            norms,
            destroyed: false,
        }))
    }

    fn temp_directory(&self) -> &Path {
        &self.temp_dir
    }
}

/// Write through `scratch` when given, then copy the staged bytes into `sink`.
fn write_staged<F>(sink: &mut dyn Write, scratch: Option<&Path>, write: F) -> LibraryResult<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    match scratch {
        Some(path) => {
            let mut staged = BufWriter::new(File::create(path)?);
            write(&mut staged)?;
            staged.flush()?;
            drop(staged);

            let mut file = File::open(path)?;
            io::copy(&mut file, sink)?;
        }
        None => write(sink)?,
    }
    Ok(())
}

fn write_floats(w: &mut dyn Write, values: &[f32]) -> io::Result<()> {
    for value in values {
        w.write_f32::<LittleEndian>(*value)?;
    }
    Ok(())
}

fn destroyed_error() -> LibraryError {
    LibraryError::new(LibraryErrorKind::InvalidInput, "index has been destroyed")
}

/// Graph index built by [`ReferenceLibrary`].
#[derive(Debug)]
pub struct ReferenceGraphIndex {
    dimension: usize,
    degree: usize,
    data: Vec<f32>,
    graph: Vec<Vec<u32>>,
    destroyed: bool,
}

impl ReferenceGraphIndex {
    /// Neighbour lists by ordinal.
    pub fn graph(&self) -> &[Vec<u32>] {
        &self.graph
    }
}

impl NativeIndex for ReferenceGraphIndex {
    fn serialize(&mut self, sink: &mut dyn Write, scratch: Option<&Path>) -> LibraryResult<()> {
        if self.destroyed {
            return Err(destroyed_error());
        }
        write_staged(sink, scratch, |w| {
            w.write_all(GRAPH_MAGIC)?;
            w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
            w.write_u32::<LittleEndian>(self.graph.len() as u32)?;
            w.write_u32::<LittleEndian>(self.dimension as u32)?;
            w.write_u32::<LittleEndian>(self.degree as u32)?;
            write_floats(w, &self.data)?;
            for neighbors in &self.graph {
                for slot in 0..self.degree {
                    let neighbor = neighbors.get(slot).copied().unwrap_or(NO_NEIGHBOR);
                    w.write_u32::<LittleEndian>(neighbor)?;
                }
            }
            Ok(())
        })
    }

    fn serialize_cpu_graph(
        &mut self,
        sink: &mut dyn Write,
        scratch: Option<&Path>,
    ) -> LibraryResult<()> {
        if self.destroyed {
            return Err(destroyed_error());
        }
        write_staged(sink, scratch, |w| {
            w.write_all(CPU_GRAPH_MAGIC)?;
            w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
            w.write_u32::<LittleEndian>(self.graph.len() as u32)?;
            w.write_u32::<LittleEndian>(self.dimension as u32)?;
            w.write_u32::<LittleEndian>(self.degree as u32)?;
            // Single layer, entered at ordinal 0.
            w.write_u32::<LittleEndian>(0)?;
            for neighbors in &self.graph {
                w.write_u32::<LittleEndian>(neighbors.len() as u32)?;
                for neighbor in neighbors {
                    w.write_u32::<LittleEndian>(*neighbor)?;
                }
            }
            write_floats(w, &self.data)
        })
    }

    fn destroy(&mut self) -> LibraryResult<()> {
        self.destroyed = true;
        self.data = Vec::new();
        self.graph = Vec::new();
        Ok(())
    }
}

/// Exact index built by [`ReferenceLibrary`].
#[derive(Debug, Clone)]
pub struct ReferenceBruteForceIndex {
    dimension: usize,
    size: usize,
    data: Vec<f32>,
    norms: Vec<f32>,
    destroyed: bool,
}

impl ReferenceBruteForceIndex {
    /// Decode an index from its serialised bytes.
    pub fn deserialize(bytes: &[u8]) -> LibraryResult<Self> {
        let mut reader = bytes;
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != BRUTE_FORCE_MAGIC {
            return Err(LibraryError::new(
                LibraryErrorKind::InvalidInput,
                "not a brute-force index",
            ));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(LibraryError::new(
                LibraryErrorKind::Unsupported,
                format!("unsupported brute-force index version {version}"),
            ));
        }
        let size = reader.read_u32::<LittleEndian>()? as usize;
        let dimension = reader.read_u32::<LittleEndian>()? as usize;

        let mut data = vec![0.0; size * dimension];
        reader.read_f32_into::<LittleEndian>(&mut data)?;
        let mut norms = vec![0.0; size];
        reader.read_f32_into::<LittleEndian>(&mut norms)?;
        if !reader.is_empty() {
            return Err(LibraryError::new(
                LibraryErrorKind::InvalidInput,
                format!("{} trailing bytes after brute-force index", reader.len()),
            ));
        }

        Ok(ReferenceBruteForceIndex {
            dimension,
            size,
            data,
            norms,
            destroyed: false,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Squared norm of the vector with ordinal `ord`.
    pub fn norm(&self, ord: usize) -> Option<f32> {
        self.norms.get(ord).copied()
    }

    /// The `k` nearest ordinals to `query` by squared L2, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dimension || self.dimension == 0 {
            return Vec::new();
        }
        let mut hits: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(ord, vector)| (ord, squared_l2(query, vector)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        hits
    }
}

impl NativeIndex for ReferenceBruteForceIndex {
    fn serialize(&mut self, sink: &mut dyn Write, scratch: Option<&Path>) -> LibraryResult<()> {
        if self.destroyed {
            return Err(destroyed_error());
        }
        write_staged(sink, scratch, |w| {
            w.write_all(BRUTE_FORCE_MAGIC)?;
            w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
            w.write_u32::<LittleEndian>(self.size as u32)?;
            w.write_u32::<LittleEndian>(self.dimension as u32)?;
            write_floats(w, &self.data)?;
            write_floats(w, &self.norms)
        })
    }

    fn destroy(&mut self) -> LibraryResult<()> {
        self.destroyed = true;
        self.data = Vec::new();
        self.norms = Vec::new();
        Ok(())
    }
}
