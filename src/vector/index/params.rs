//! Build parameters passed to the index library.

use serde::{Deserialize, Serialize};

/// Algorithm used to build the initial kNN graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphBuildAlgo {
    /// Nearest-neighbour descent.
    #[default]
    NnDescent,
    /// Inverted file with product quantization.
    IvfPq,
}

/// Parameters of a graph index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphIndexParams {
    /// Number of library worker threads.
    pub writer_threads: usize,
    /// Degree of the intermediate kNN graph.
    pub intermediate_graph_degree: usize,
    /// Degree of the final pruned graph.
    pub graph_degree: usize,
    /// Initial graph construction algorithm.
    pub build_algo: GraphBuildAlgo,
}

impl Default for GraphIndexParams {
    fn default() -> Self {
        GraphIndexParams {
            writer_threads: 1,
            intermediate_graph_degree: 128,
            graph_degree: 64,
            build_algo: GraphBuildAlgo::NnDescent,
        }
    }
}

impl GraphIndexParams {
    pub fn with_writer_threads(mut self, writer_threads: usize) -> Self {
        self.writer_threads = writer_threads;
        self
    }

    pub fn with_intermediate_graph_degree(mut self, degree: usize) -> Self {
        self.intermediate_graph_degree = degree;
        self
    }

    pub fn with_graph_degree(mut self, degree: usize) -> Self {
        self.graph_degree = degree;
        self
    }

    pub fn with_build_algo(mut self, build_algo: GraphBuildAlgo) -> Self {
        self.build_algo = build_algo;
        self
    }

    /// Degrees clamped to what a dataset of `size` vectors can support.
    ///
    /// Returns `(intermediate_graph_degree, graph_degree)`.
    pub fn effective_degrees(&self, size: usize) -> (usize, usize) {
        let intermediate = self.intermediate_graph_degree.min(size.saturating_sub(1));
        let graph = self.graph_degree.min(intermediate);
        (intermediate, graph)
    }
}

/// Parameters of a brute-force index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BruteForceIndexParams {
    /// Number of library worker threads.
    pub writer_threads: usize,
}

impl Default for BruteForceIndexParams {
    fn default() -> Self {
        BruteForceIndexParams {
            writer_threads: num_cpus::get(),
        }
    }
}

impl BruteForceIndexParams {
    pub fn with_writer_threads(mut self, writer_threads: usize) -> Self {
        self.writer_threads = writer_threads;
        self
    }
}
