//! Index representation kinds and the set of kinds requested per writer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};

/// One of the index representations a field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    /// Accelerated graph index.
    FastGraph,
    /// Exact brute-force index.
    BruteForce,
    /// Graph index in a layout searchable on the CPU.
    CpuGraph,
}

impl IndexKind {
    /// All kinds, in the order they are built and laid out in the index blob.
    pub const ALL: [IndexKind; 3] = [
        IndexKind::FastGraph,
        IndexKind::BruteForce,
        IndexKind::CpuGraph,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::FastGraph => "fast-graph",
            IndexKind::BruteForce => "brute-force",
            IndexKind::CpuGraph => "cpu-graph",
        }
    }

    fn flag(&self) -> u8 {
        match self {
            IndexKind::FastGraph => 0b001,
            IndexKind::BruteForce => 0b010,
            IndexKind::CpuGraph => 0b100,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = PilumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fast-graph" | "cagra" => Ok(IndexKind::FastGraph),
            "brute-force" | "bf" => Ok(IndexKind::BruteForce),
            "cpu-graph" | "hnsw" => Ok(IndexKind::CpuGraph),
            other => Err(PilumError::invalid_argument(format!(
                "Unknown index type: {other}"
            ))),
        }
    }
}

/// A set of requested index kinds.
///
/// Kinds are independent flags; any combination may be requested.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexTypeSet(u8);

impl IndexTypeSet {
    pub const EMPTY: IndexTypeSet = IndexTypeSet(0);
    pub const FAST_GRAPH: IndexTypeSet = IndexTypeSet(0b001);
    pub const BRUTE_FORCE: IndexTypeSet = IndexTypeSet(0b010);
    pub const CPU_GRAPH: IndexTypeSet = IndexTypeSet(0b100);
    pub const FAST_GRAPH_AND_BRUTE_FORCE: IndexTypeSet = IndexTypeSet(0b011);

    /// The set holding exactly `kind`.
    pub fn only(kind: IndexKind) -> Self {
        IndexTypeSet(kind.flag())
    }

    pub fn contains(&self, kind: IndexKind) -> bool {
        self.0 & kind.flag() != 0
    }

    pub fn insert(&mut self, kind: IndexKind) {
        self.0 |= kind.flag();
    }

    pub fn remove(&mut self, kind: IndexKind) {
        self.0 &= !kind.flag();
    }

    /// A copy with `kind` added.
    pub fn with(mut self, kind: IndexKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Contained kinds in build order.
    pub fn kinds(&self) -> impl Iterator<Item = IndexKind> + '_ {
        IndexKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }
}

impl fmt::Display for IndexTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.kinds().map(|kind| kind.name()).collect();
        f.write_str(&names.join(","))
    }
}

impl fmt::Debug for IndexTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexTypeSet({self})")
    }
}

impl FromStr for IndexTypeSet {
    type Err = PilumError;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = IndexTypeSet::EMPTY;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            set.insert(part.parse()?);
        }
        if set.is_empty() {
            return Err(PilumError::invalid_argument(
                "at least one index type must be requested",
            ));
        }
        Ok(set)
    }
}

impl TryFrom<String> for IndexTypeSet {
    type Error = PilumError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IndexTypeSet> for String {
    fn from(value: IndexTypeSet) -> Self {
        value.to_string()
    }
}
