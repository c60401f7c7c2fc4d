//! Command line argument parsing for the Pilum CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::vector::index::kind::IndexTypeSet;

/// Pilum - builds segment vector indexes
#[derive(Parser, Debug, Clone)]
#[command(name = "pilum")]
#[command(about = "Builds and inspects segment vector indexes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Pilum Contributors")]
#[command(long_about = None)]
pub struct PilumArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PilumArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write a segment from a JSON file of vectors
    Build(BuildArgs),

    /// Print the metadata rows of an existing segment
    Inspect(InspectArgs),
}

/// Arguments for building a segment
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Vectors to index (JSON)
    #[arg(short, long, value_name = "VECTORS_FILE")]
    pub input: PathBuf,

    /// Directory the segment files are written to
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Segment name
    #[arg(short, long, default_value = "_0")]
    pub segment: String,

    /// Segment suffix
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Index types to build, comma-separated (overrides the config file)
    #[arg(short = 't', long, env = "PILUM_INDEX_TYPES")]
    pub index_types: Option<IndexTypeSet>,

    /// Writer configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Worker threads of graph builds (overrides the config file)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Directory for scratch files (default: system temp directory)
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,
}

/// Arguments for inspecting a segment
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    /// Directory holding the segment files
    #[arg(short, long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Segment name
    #[arg(short, long, default_value = "_0")]
    pub segment: String,

    /// Segment suffix
    #[arg(long, default_value = "")]
    pub suffix: String,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity() {
        let args = PilumArgs::try_parse_from(["pilum", "inspect", "--dir", "/tmp/x"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args =
            PilumArgs::try_parse_from(["pilum", "-vv", "inspect", "--dir", "/tmp/x"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args =
            PilumArgs::try_parse_from(["pilum", "--quiet", "inspect", "--dir", "/tmp/x"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_build_args() {
        let args = PilumArgs::try_parse_from([
            "pilum",
            "build",
            "--input",
            "vectors.json",
            "--output",
            "out",
            "--index-types",
            "fast-graph,brute-force",
        ])
        .unwrap();

        match args.command {
            Command::Build(build) => {
                assert_eq!(build.segment, "_0");
                assert_eq!(build.index_types, Some(IndexTypeSet::FAST_GRAPH_AND_BRUTE_FORCE));
                assert!(build.config.is_none());
            }
            other => panic!("Expected Build command, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_index_types_are_rejected() {
        let result = PilumArgs::try_parse_from([
            "pilum",
            "build",
            "-i",
            "vectors.json",
            "-o",
            "out",
            "-t",
            "ivf",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format() {
        let args =
            PilumArgs::try_parse_from(["pilum", "--format", "json", "inspect", "-d", "/tmp/x"])
                .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
