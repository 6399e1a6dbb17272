// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::dag::{BuildJob, Scheduler};
use crate::engine::{BuildReport, RuntimeOptions};
use crate::types::{PackageName, PackageStatus};

/// A progress line is logged after this many completed builds.
pub const PROGRESS_EVERY: usize = 10;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Write the ledger to durable storage. Always precedes any dispatch
    /// produced by the same step.
    PersistLedger,
    /// Send these jobs to the executor.
    DispatchBuilds(Vec<BuildJob>),
    /// Nothing is in flight and nothing more will be dispatched.
    Finish,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }
}

/// Mutable dispatch bookkeeping owned by the core.
#[derive(Debug)]
pub struct DispatchState {
    pub in_flight: BTreeSet<PackageName>,
    /// Cleared by a shutdown request.
    pub accepting: bool,
    /// Completions applied in this process.
    pub completed: usize,
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            in_flight: BTreeSet::new(),
            accepting: true,
            completed: 0,
        }
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Initial scheduling pass for a fresh or resumed run.
pub fn handle_start(
    scheduler: &mut Scheduler,
    state: &mut DispatchState,
    options: &RuntimeOptions,
) -> CoreStep {
    info!(
        run_id = %scheduler.ledger().run_id,
        packages = scheduler.ledger().packages.len(),
        pending = scheduler.ledger().pending().len(),
        parallel = options.parallel,
        "starting dispatch"
    );
    schedule_and_emit(scheduler, state, options)
}

/// Handle a build completion event.
///
/// The report is applied to the ledger, then the scheduler gets a chance
/// to block dependents and fill the freed worker slot.
pub fn handle_build_finished(
    scheduler: &mut Scheduler,
    state: &mut DispatchState,
    options: &RuntimeOptions,
    package: PackageName,
    report: BuildReport,
) -> CoreStep {
    if !state.in_flight.remove(&package) {
        warn!(package = %package, "completion for package that is not in flight; ignoring");
        return CoreStep::idle();
    }

    debug!(package = %package, success = report.is_success(), "build finished");
    let step = scheduler.step_completion(&package, report);
    state.completed += 1;
    if state.completed % PROGRESS_EVERY == 0 {
        let ledger = scheduler.ledger();
        let remaining =
            ledger.count(PackageStatus::Pending) + ledger.count(PackageStatus::Building);
        info!(
            built_ok = ledger.count(PackageStatus::Success),
            failed = ledger.failure_count(),
            remaining,
            "progress"
        );
    }
    if step.halted && state.accepting {
        info!(
            in_flight = state.in_flight.len(),
            "failure policy triggered; draining in-flight builds"
        );
    }

    schedule_and_emit(scheduler, state, options)
}

/// Handle a shutdown request: no new dispatches; finish once drained.
pub fn handle_shutdown(
    scheduler: &mut Scheduler,
    state: &mut DispatchState,
    options: &RuntimeOptions,
) -> CoreStep {
    if state.accepting {
        info!(
            in_flight = state.in_flight.len(),
            "shutdown requested; waiting for in-flight builds"
        );
    }
    state.accepting = false;

    if state.in_flight.is_empty() {
        schedule_and_emit(scheduler, state, options)
    } else {
        CoreStep::idle()
    }
}

fn schedule_and_emit(
    scheduler: &mut Scheduler,
    state: &mut DispatchState,
    options: &RuntimeOptions,
) -> CoreStep {
    let step = scheduler.schedule(state.in_flight.len(), options.parallel, state.accepting);

    for job in &step.newly_scheduled {
        state.in_flight.insert(job.package.clone());
    }

    let finished = state.in_flight.is_empty();
    if finished {
        scheduler.finish_run();
    }

    let mut commands = vec![CoreCommand::PersistLedger];
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchBuilds(step.newly_scheduled));
    }
    if finished {
        info!(
            complete = scheduler.ledger().is_complete(),
            failed = scheduler.ledger().failure_count(),
            "no builds in flight; run finished"
        );
        commands.push(CoreCommand::Finish);
    }

    CoreStep {
        commands,
        keep_running: !finished,
    }
}
