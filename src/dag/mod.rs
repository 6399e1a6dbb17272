// src/dag/mod.rs

//! Dependency graph and scheduling.
//!
//! - [`graph`] holds the package dependency graph and its ordering queries.
//! - [`exclusions`] is the curated table of soft dependencies.
//! - [`builder`] turns package index metadata into a graph.
//! - [`scheduler`] decides which packages are ready and applies results.
//! - [`job`] is the unit of work handed to the build step.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] applies readiness / blocking decisions to a ledger.

pub mod builder;
pub mod exclusions;
pub mod graph;
pub mod job;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use builder::{build_dependency_graph, ExcludedEdge, GraphBuildResult};
pub use exclusions::SoftDependencyExclusions;
pub use graph::{DependencyGraph, PackageNode};
pub use job::BuildJob;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use state_manager::Readiness;
