// src/dag/job.rs

//! Unit of work handed to the build step.

use crate::types::PackageName;

/// A package that became ready and was marked BUILDING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub package: PackageName,
    /// Advisory version from the package index.
    pub version: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    pub run_id: String,
}
