//! Build strategies for the three index representations.
//!
//! Each strategy builds an index over a [`Dataset`] through the configured
//! [`IndexLibrary`] and streams the serialised bytes into a sink. Graph
//! indexes are staged through a scratch file in the library's temp directory.
//! The native index is released as soon as it has been serialised.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;

use crate::error::{PilumError, Result};
use crate::vector::dataset::Dataset;
use crate::vector::index::kind::IndexKind;
use crate::vector::index::params::{BruteForceIndexParams, GraphIndexParams};
use crate::vector::index::policy::GraphThresholds;
use crate::vector::info::{InfoStream, PILUM_COMPONENT};
use crate::vector::library::{IndexHandle, IndexLibrary};

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub kind: IndexKind,
    pub vectors: usize,
    /// Wall-clock build time, excluding serialisation.
    pub elapsed: Duration,
}

/// Builds and serialises indexes for one writer.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    library: Arc<dyn IndexLibrary>,
    graph_params: GraphIndexParams,
    brute_force_params: BruteForceIndexParams,
    thresholds: GraphThresholds,
    info_stream: Arc<dyn InfoStream>,
}

impl IndexBuilder {
    pub fn new(
        library: Arc<dyn IndexLibrary>,
        graph_params: GraphIndexParams,
        brute_force_params: BruteForceIndexParams,
        info_stream: Arc<dyn InfoStream>,
    ) -> Self {
        IndexBuilder {
            library,
            graph_params,
            brute_force_params,
            thresholds: GraphThresholds::default(),
            info_stream,
        }
    }

    pub fn with_thresholds(mut self, thresholds: GraphThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn graph_params(&self) -> &GraphIndexParams {
        &self.graph_params
    }

    pub fn brute_force_params(&self) -> &BruteForceIndexParams {
        &self.brute_force_params
    }

    /// Build the fast-graph index of `field` and write it to `sink`.
    pub fn write_fast_graph(
        &self,
        field: &str,
        dataset: &Dataset,
        sink: &mut dyn Write,
    ) -> Result<BuildReport> {
        self.write_graph(IndexKind::FastGraph, field, dataset, sink)
    }

    /// Build the CPU-graph index of `field` and write it to `sink`.
    pub fn write_cpu_graph(
        &self,
        field: &str,
        dataset: &Dataset,
        sink: &mut dyn Write,
    ) -> Result<BuildReport> {
        self.write_graph(IndexKind::CpuGraph, field, dataset, sink)
    }

    /// Build the brute-force index of `field` and write it to `sink`.
    ///
    /// Any dataset size is accepted, including zero.
    pub fn write_brute_force(
        &self,
        field: &str,
        dataset: &Dataset,
        sink: &mut dyn Write,
    ) -> Result<BuildReport> {
        let kind = IndexKind::BruteForce;
        let start = Instant::now();
        let index = self
            .library
            .build_brute_force(dataset, &self.brute_force_params)
            .map_err(|e| PilumError::index_build(field, kind, e))?;
        let handle = IndexHandle::new(index);
        let report = self.report(kind, dataset.size(), start.elapsed());

        handle
            .serialize_and_release(sink, None)
            .map_err(|e| PilumError::index_build(field, kind, e))?;
        Ok(report)
    }

    fn write_graph(
        &self,
        kind: IndexKind,
        field: &str,
        dataset: &Dataset,
        sink: &mut dyn Write,
    ) -> Result<BuildReport> {
        let required = match kind {
            IndexKind::CpuGraph => self.thresholds.min_cpu_graph_exclusive + 1,
            _ => self.thresholds.min_fast_graph_size,
        };
        if dataset.size() < required {
            return Err(PilumError::insufficient_data(required, dataset.size()));
        }

        let start = Instant::now();
        let index = self
            .library
            .build_graph(dataset, &self.graph_params)
            .map_err(|e| PilumError::index_build(field, kind, e))?;
        let handle = IndexHandle::new(index);
        let report = self.report(kind, dataset.size(), start.elapsed());

        let scratch = self.scratch_file(kind)?;
        let result = match kind {
            IndexKind::CpuGraph => {
                handle.serialize_cpu_graph_and_release(sink, Some(scratch.path()))
            }
            _ => handle.serialize_and_release(sink, Some(scratch.path())),
        };
        result.map_err(|e| PilumError::index_build(field, kind, e))?;
        Ok(report)
    }

    fn scratch_file(&self, kind: IndexKind) -> Result<NamedTempFile> {
        let suffix = match kind {
            IndexKind::CpuGraph => ".hnsw",
            _ => ".graph",
        };
        let file = tempfile::Builder::new()
            .prefix("tmpindex")
            .suffix(suffix)
            .tempfile_in(self.library.temp_directory())?;
        Ok(file)
    }

    fn report(&self, kind: IndexKind, vectors: usize, elapsed: Duration) -> BuildReport {
        if self.info_stream.is_enabled(PILUM_COMPONENT) {
            self.info_stream.message(
                PILUM_COMPONENT,
                &format!(
                    "{kind} index created in {}ms, with {vectors} vectors",
                    elapsed.as_millis()
                ),
            );
        }
        BuildReport {
            kind,
            vectors,
            elapsed,
        }
    }
}
