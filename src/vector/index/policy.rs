//! Decides which index kinds are built and how build failures are handled.

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::vector::index::kind::{IndexKind, IndexTypeSet};

/// Minimum dataset size for a fast-graph build.
pub const MIN_FAST_GRAPH_SIZE: usize = 2;

/// A CPU-graph build is attempted only for datasets strictly larger than this.
pub const MIN_CPU_GRAPH_EXCLUSIVE: usize = 2;

/// Size thresholds of the graph builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphThresholds {
    /// Fast-graph needs at least this many vectors.
    pub min_fast_graph_size: usize,
    /// CPU-graph needs strictly more than this many vectors.
    pub min_cpu_graph_exclusive: usize,
}

impl Default for GraphThresholds {
    fn default() -> Self {
        GraphThresholds {
            min_fast_graph_size: MIN_FAST_GRAPH_SIZE,
            min_cpu_graph_exclusive: MIN_CPU_GRAPH_EXCLUSIVE,
        }
    }
}

/// Outcome of a recoverable build failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Record a zero-length representation and carry on.
    Skip,
    /// Record a zero-length representation and build brute-force only from here.
    FallBackToBruteForce,
}

/// Degradation rules applied while building the indexes of one field.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegradationPolicy {
    thresholds: GraphThresholds,
}

impl DegradationPolicy {
    pub fn new(thresholds: GraphThresholds) -> Self {
        DegradationPolicy { thresholds }
    }

    pub fn thresholds(&self) -> &GraphThresholds {
        &self.thresholds
    }

    /// Effective index kinds for a dataset of `size` vectors.
    ///
    /// A fast-graph request on a dataset too small for it becomes brute-force only.
    pub fn plan(&self, requested: IndexTypeSet, size: usize) -> IndexTypeSet {
        if requested.contains(IndexKind::FastGraph) && size < self.thresholds.min_fast_graph_size {
            IndexTypeSet::BRUTE_FORCE
        } else {
            requested
        }
    }

    /// Whether a CPU-graph build should run for `size` vectors.
    pub fn should_attempt_cpu_graph(&self, size: usize) -> bool {
        size > self.thresholds.min_cpu_graph_exclusive
    }

    /// Classify a failed build of `kind`.
    ///
    /// Only a degenerate-graph failure of a graph build is recoverable; every
    /// other error is returned unchanged.
    pub fn on_failure(&self, kind: IndexKind, error: PilumError) -> Result<Recovery> {
        let recoverable = matches!(
            &error,
            PilumError::IndexBuild { source, .. } if source.is_degenerate_graph()
        );
        match (kind, recoverable) {
            (IndexKind::FastGraph, true) => Ok(Recovery::FallBackToBruteForce),
            (IndexKind::CpuGraph, true) => Ok(Recovery::Skip),
            _ => Err(error),
        }
    }
}
