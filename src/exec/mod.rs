// src/exec/mod.rs

//! Build execution layer.
//!
//! - [`build_step`] defines the [`BuildStep`] collaborator that builds one
//!   package, and the production [`CommandBuildStep`].
//! - [`executor_loop`] owns the worker tasks: one blocking build per
//!   package, reporting back via `RuntimeEvent::BuildFinished`.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend` used in production, which tests can replace with
//!   a fake implementation.

pub mod backend;
pub mod build_step;
pub mod executor_loop;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use build_step::{BuildStep, CommandBuildStep};
pub use executor_loop::spawn_executor;
