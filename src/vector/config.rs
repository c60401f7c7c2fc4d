//! Configuration of the segment vector writer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::vector::index::kind::IndexTypeSet;
use crate::vector::index::params::{BruteForceIndexParams, GraphBuildAlgo, GraphIndexParams};
use crate::vector::index::policy::GraphThresholds;

/// Settings supplied when a writer is constructed.
///
/// Every field has a default, so a JSON file only needs to name what it changes:
///
/// ```
/// use pilum::vector::config::WriterConfig;
///
/// let config = WriterConfig::from_json_str(r#"{"graph_degree": 32}"#).unwrap();
/// assert_eq!(config.graph_degree, 32);
/// assert_eq!(config.intermediate_graph_degree, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Worker threads of graph builds.
    pub writer_threads: usize,
    /// Degree of the intermediate kNN graph.
    pub intermediate_graph_degree: usize,
    /// Degree of the final graph.
    pub graph_degree: usize,
    /// Worker threads of brute-force builds.
    pub brute_force_threads: usize,
    /// Index kinds built for every field.
    pub index_types: IndexTypeSet,
    /// Size thresholds of the graph builds.
    pub graph_thresholds: GraphThresholds,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            writer_threads: 1,
            intermediate_graph_degree: 128,
            graph_degree: 64,
            brute_force_threads: num_cpus::get(),
            index_types: IndexTypeSet::FAST_GRAPH,
            graph_thresholds: GraphThresholds::default(),
        }
    }
}

impl WriterConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WriterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PilumError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Check that the settings describe a buildable configuration.
    pub fn validate(&self) -> Result<()> {
        if self.writer_threads == 0 {
            return Err(PilumError::invalid_config("writer_threads must be positive"));
        }
        if self.brute_force_threads == 0 {
            return Err(PilumError::invalid_config(
                "brute_force_threads must be positive",
            ));
        }
        if self.intermediate_graph_degree == 0 || self.graph_degree == 0 {
            return Err(PilumError::invalid_config("graph degrees must be positive"));
        }
        if self.graph_degree > self.intermediate_graph_degree {
            return Err(PilumError::invalid_config(format!(
                "graph_degree ({}) must not exceed intermediate_graph_degree ({})",
                self.graph_degree, self.intermediate_graph_degree
            )));
        }
        if self.index_types.is_empty() {
            return Err(PilumError::invalid_config(
                "at least one index type must be requested",
            ));
        }
        if self.graph_thresholds.min_fast_graph_size < 2 {
            return Err(PilumError::invalid_config(
                "min_fast_graph_size must be at least 2",
            ));
        }
        if self.graph_thresholds.min_cpu_graph_exclusive < 1 {
            return Err(PilumError::invalid_config(
                "min_cpu_graph_exclusive must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parameters of graph builds.
    pub fn graph_params(&self) -> GraphIndexParams {
        GraphIndexParams::default()
            .with_writer_threads(self.writer_threads)
            .with_intermediate_graph_degree(self.intermediate_graph_degree)
            .with_graph_degree(self.graph_degree)
            .with_build_algo(GraphBuildAlgo::NnDescent)
    }

    /// Parameters of brute-force builds.
    pub fn brute_force_params(&self) -> BruteForceIndexParams {
        BruteForceIndexParams::default().with_writer_threads(self.brute_force_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.writer_threads, 1);
        assert_eq!(config.intermediate_graph_degree, 128);
        assert_eq!(config.graph_degree, 64);
        assert_eq!(config.index_types, IndexTypeSet::FAST_GRAPH);
        assert!(config.brute_force_threads >= 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = WriterConfig {
            writer_threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PilumError::InvalidConfig(_))
        ));

        let config = WriterConfig {
            graph_degree: 256,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WriterConfig {
            index_types: IndexTypeSet::EMPTY,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WriterConfig {
            graph_thresholds: GraphThresholds {
                min_fast_graph_size: 2,
                min_cpu_graph_exclusive: 0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_tune_independently() {
        let config = WriterConfig {
            graph_thresholds: GraphThresholds {
                min_fast_graph_size: 5,
                min_cpu_graph_exclusive: 2,
            },
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let config = WriterConfig {
            index_types: IndexTypeSet::FAST_GRAPH_AND_BRUTE_FORCE,
            brute_force_threads: 4,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"index_types\":\"fast-graph,brute-force\""));
        assert_eq!(WriterConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"index_types": "brute-force", "writer_threads": 2}}"#).unwrap();

        let config = WriterConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.index_types, IndexTypeSet::BRUTE_FORCE);
        assert_eq!(config.writer_threads, 2);
        assert_eq!(config.graph_params().writer_threads, 2);

        assert!(WriterConfig::from_json_file("/nonexistent/writer.json").is_err());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(WriterConfig::from_json_str(r#"{"graph_degree": 500}"#).is_err());
        assert!(WriterConfig::from_json_str("not json").is_err());
    }
}
