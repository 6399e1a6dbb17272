// tests/core_runtime.rs

mod common;
use crate::common::builders::{GraphBuilder, LedgerBuilder};
use crate::common::init_tracing;

use std::sync::Arc;

use stackbuild::dag::{BuildJob, Scheduler};
use stackbuild::engine::event_handlers::PROGRESS_EVERY;
use stackbuild::engine::{BuildReport, CoreCommand, CoreRuntime, CoreStep, RuntimeEvent, RuntimeOptions};
use stackbuild::types::{FailureType, PackageStatus};

fn dispatched(step: &CoreStep) -> Vec<String> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::DispatchBuilds(jobs) => Some(jobs.iter().map(|j: &BuildJob| j.package.clone())),
            _ => None,
        })
        .flatten()
        .collect()
}

fn finished(package: &str, report: BuildReport) -> RuntimeEvent {
    RuntimeEvent::BuildFinished {
        package: package.to_string(),
        report,
    }
}

fn core_for_chain(parallel: usize) -> CoreRuntime {
    let graph = GraphBuilder::new()
        .nodes(&["A", "B", "C"])
        .edge("B", "A")
        .edge("C", "B")
        .build();
    let ledger = LedgerBuilder::new(&["A", "B", "C"]).parallel(parallel).build();
    CoreRuntime::new(Scheduler::new(Arc::new(graph), ledger), RuntimeOptions { parallel })
}

#[test]
fn persist_always_precedes_dispatch() {
    init_tracing();
    let mut core = core_for_chain(2);

    let step = core.start();
    assert_eq!(step.commands.first(), Some(&CoreCommand::PersistLedger));
    assert_eq!(dispatched(&step), vec!["A"]);
    assert!(step.keep_running);
    assert_eq!(core.in_flight(), 1);
    assert_eq!(core.completed_builds(), 0);
}

#[test]
fn long_run_counts_every_completion() {
    init_tracing();
    let names: Vec<String> = (0..PROGRESS_EVERY + 2).map(|i| format!("pkg-{i:02}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let graph = GraphBuilder::new().nodes(&refs).build();
    let ledger = LedgerBuilder::new(&refs).parallel(3).build();
    let mut core = CoreRuntime::new(
        Scheduler::new(Arc::new(graph), ledger),
        RuntimeOptions { parallel: 3 },
    );

    let mut queue = dispatched(&core.start());
    let mut done = 0;
    while let Some(package) = queue.pop() {
        let report = if package == "pkg-03" {
            BuildReport::failed(FailureType::BuildFailed, "boom", None)
        } else {
            BuildReport::success(None)
        };
        let step = core.step(finished(&package, report));
        done += 1;
        assert_eq!(core.completed_builds(), done);
        queue.extend(dispatched(&step));
    }

    assert_eq!(done, PROGRESS_EVERY + 2);
    assert_eq!(core.ledger().succeeded().len(), PROGRESS_EVERY + 1);
    assert_eq!(core.ledger().failure_count(), 1);
    assert!(core.ledger().is_complete());
}

#[test]
fn chain_runs_to_completion() {
    let mut core = core_for_chain(2);
    core.start();

    let step = core.step(finished("A", BuildReport::success(None)));
    assert_eq!(dispatched(&step), vec!["B"]);

    let step = core.step(finished("B", BuildReport::success(None)));
    assert_eq!(dispatched(&step), vec!["C"]);

    let step = core.step(finished("C", BuildReport::success(None)));
    assert!(!step.keep_running);
    assert_eq!(step.commands.last(), Some(&CoreCommand::Finish));

    let ledger = core.into_ledger();
    assert_eq!(ledger.succeeded(), vec!["A", "B", "C"]);
    assert!(ledger.completed_at.is_some());
}

#[test]
fn failure_blocks_and_finishes() {
    let mut core = core_for_chain(2);
    core.start();

    let step = core.step(finished(
        "A",
        BuildReport::failed(FailureType::MissingDep, "no python3-foo", None),
    ));
    assert!(dispatched(&step).is_empty());
    assert!(!step.keep_running);

    let ledger = core.ledger();
    assert_eq!(ledger.status_of("B"), Some(PackageStatus::Blocked));
    assert_eq!(ledger.status_of("C"), Some(PackageStatus::Blocked));
    assert!(ledger.is_complete());
}

#[test]
fn unknown_completion_is_ignored() {
    let mut core = core_for_chain(1);
    core.start();

    let step = core.step(finished("C", BuildReport::success(None)));
    assert!(step.commands.is_empty());
    assert!(step.keep_running);
    assert_eq!(core.in_flight(), 1);
}

#[test]
fn shutdown_drains_in_flight_builds() {
    let graph = GraphBuilder::new().nodes(&["a", "b", "c"]).build();
    let ledger = LedgerBuilder::new(&["a", "b", "c"]).parallel(2).build();
    let mut core = CoreRuntime::new(
        Scheduler::new(Arc::new(graph), ledger),
        RuntimeOptions { parallel: 2 },
    );

    assert_eq!(dispatched(&core.start()), vec!["a", "b"]);

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(step.keep_running);
    assert!(!core.is_accepting());

    let step = core.step(finished("a", BuildReport::success(None)));
    assert!(dispatched(&step).is_empty());
    assert!(step.keep_running);

    let step = core.step(finished("b", BuildReport::success(None)));
    assert!(!step.keep_running);
    assert_eq!(core.ledger().status_of("c"), Some(PackageStatus::Pending));
    assert!(core.ledger().completed_at.is_none());
}

#[test]
fn empty_run_finishes_immediately() {
    let ledger = LedgerBuilder::new(&[]).build();
    let mut core = CoreRuntime::new(
        Scheduler::new(Arc::new(GraphBuilder::new().build()), ledger),
        RuntimeOptions { parallel: 0 },
    );

    let step = core.start();
    assert!(!step.keep_running);
    assert_eq!(
        step.commands,
        vec![CoreCommand::PersistLedger, CoreCommand::Finish]
    );
}
