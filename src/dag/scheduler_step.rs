// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::job::BuildJob;
use crate::types::PackageName;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the scheduler and
/// make assertions about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Packages marked BUILDING in this step, in build order.
    pub newly_scheduled: Vec<BuildJob>,
    /// Packages newly marked FAILED (the completed package, or stalled
    /// packages that can never become ready).
    pub newly_failed: Vec<PackageName>,
    /// Packages newly marked BLOCKED because a dependency cannot succeed.
    pub newly_blocked: Vec<PackageName>,
    /// Whether the failure policy now forbids new dispatches.
    pub halted: bool,
}
