use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{IgnoredEdges, ReadOnlyStateManager, Readiness, StateManager};
use crate::engine::{BuildOutcome, BuildReport};
use crate::ledger::Ledger;
use crate::types::{PackageName, PackageStatus};

/// Scheduler holds the read-only dependency graph plus the run's ledger.
///
/// It is responsible for:
/// - deciding which PENDING packages are ready (deps SUCCESS, or SKIPPED
///   when the run allows it)
/// - marking packages BUILDING / SUCCESS / FAILED
/// - deriving BLOCKED for packages whose dependencies cannot succeed
/// - refusing new dispatches once the failure policy says stop
///
/// Only packages present in the ledger take part in the run; dependencies
/// outside it never hold anything back.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<DependencyGraph>,
    ledger: Ledger,
    ignored_edges: IgnoredEdges,
}

impl Scheduler {
    pub fn new(graph: Arc<DependencyGraph>, ledger: Ledger) -> Self {
        Self {
            graph,
            ledger,
            ignored_edges: IgnoredEdges::new(),
        }
    }

    /// Edges not to wait on. Used when cycles were explicitly allowed.
    pub fn with_ignored_edges(
        mut self,
        edges: impl IntoIterator<Item = (PackageName, PackageName)>,
    ) -> Self {
        self.ignored_edges.extend(edges);
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Readiness of a package, or `None` if it is unknown or not PENDING.
    pub fn readiness(&self, package: &str) -> Option<Readiness> {
        if self.ledger.status_of(package)? != PackageStatus::Pending {
            return None;
        }
        let view = ReadOnlyStateManager::new(&self.graph, &self.ledger, &self.ignored_edges);
        Some(view.readiness(package))
    }

    /// Derive BLOCKED packages and, unless halted, mark up to
    /// `parallel - in_flight` ready packages BUILDING.
    ///
    /// `accept_new = false` (shutdown) only derives BLOCKED. When nothing is
    /// in flight, nothing could be dispatched and packages are still PENDING,
    /// those packages are failed as stalled.
    pub fn schedule(&mut self, in_flight: usize, parallel: usize, accept_new: bool) -> SchedulerStep {
        let mut manager = StateManager::new(&self.graph, &mut self.ledger, &self.ignored_edges);
        let mut step = SchedulerStep {
            newly_blocked: manager.propagate_blocked(),
            ..SchedulerStep::default()
        };

        step.halted = self.ledger.should_stop();
        if step.halted {
            debug!(
                failures = self.ledger.failure_count(),
                "failure policy reached; not dispatching"
            );
            return step;
        }
        if !accept_new {
            return step;
        }

        let capacity = parallel.max(1).saturating_sub(in_flight);
        let mut manager = StateManager::new(&self.graph, &mut self.ledger, &self.ignored_edges);
        step.newly_scheduled = manager.collect_ready(capacity);

        if in_flight == 0 && step.newly_scheduled.is_empty() && !self.ledger.pending().is_empty() {
            warn!(
                pending = self.ledger.pending().len(),
                "no package can make progress; failing stalled packages"
            );
            let mut manager = StateManager::new(&self.graph, &mut self.ledger, &self.ignored_edges);
            step.newly_failed = manager.fail_stalled();
            step.halted = self.ledger.should_stop();
        }

        step
    }

    /// Record a worker's report for a BUILDING package.
    pub fn step_completion(&mut self, package: &str, report: BuildReport) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        match self.ledger.status_of(package) {
            Some(PackageStatus::Building) => {}
            Some(other) => {
                warn!(package = %package, status = %other, "completion for package that is not building; ignoring");
                return step;
            }
            None => {
                warn!(package = %package, "completion for unknown package; ignoring");
                return step;
            }
        }

        match report.outcome {
            BuildOutcome::Success => {
                self.ledger.mark_success(package, report.log_path);
            }
            BuildOutcome::Failed {
                failure_type,
                message,
            } => {
                self.ledger
                    .mark_failed(package, failure_type, message, report.log_path);
                step.newly_failed.push(package.to_string());
            }
        }

        step.halted = self.ledger.should_stop();
        if step.halted {
            info!(
                failures = self.ledger.failure_count(),
                max_failures = self.ledger.max_failures,
                keep_going = self.ledger.keep_going,
                "stopping new dispatches"
            );
        }
        step
    }

    /// Stamp completion time if every package is terminal.
    pub fn finish_run(&mut self) {
        self.ledger.mark_completed_if_done();
    }
}
