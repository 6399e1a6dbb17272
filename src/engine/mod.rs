// src/engine/mod.rs

//! Orchestration engine for stackbuild.
//!
//! This module ties together:
//! - the scheduler and its ledger
//! - the bounded dispatch of ready packages to workers
//! - the main runtime event loop that reacts to:
//!   - build completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::path::PathBuf;

use crate::types::{FailureType, PackageName};

/// Outcome of one package build as classified by the build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failed {
        failure_type: FailureType,
        message: String,
    },
}

/// What a worker reports back for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub log_path: Option<PathBuf>,
}

impl BuildReport {
    pub fn success(log_path: Option<PathBuf>) -> Self {
        Self {
            outcome: BuildOutcome::Success,
            log_path,
        }
    }

    pub fn failed(
        failure_type: FailureType,
        message: impl Into<String>,
        log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            outcome: BuildOutcome::Failed {
                failure_type,
                message: message.into(),
            },
            log_path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Success)
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Maximum number of packages building at once.
    pub parallel: usize,
}

/// Events flowing into the runtime from workers and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A worker finished building a package.
    BuildFinished {
        package: PackageName,
        report: BuildReport,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C): stop dispatching and
    /// drain in-flight builds.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
