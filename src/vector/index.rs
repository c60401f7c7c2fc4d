//! Index kinds, build parameters, build strategies and the degradation policy.
//!
//! - [`kind`]: the representations a field can carry and the requested set
//! - [`params`]: parameters handed to the index library
//! - [`strategy`]: builds one representation and streams its bytes
//! - [`policy`]: which representations are attempted, and which failures are recoverable

pub mod kind;
pub mod params;
pub mod policy;
pub mod strategy;

pub use kind::{IndexKind, IndexTypeSet};
pub use params::{BruteForceIndexParams, GraphBuildAlgo, GraphIndexParams};
pub use policy::{DegradationPolicy, GraphThresholds, Recovery};
pub use strategy::{BuildReport, IndexBuilder};
