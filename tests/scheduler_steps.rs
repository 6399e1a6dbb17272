// tests/scheduler_steps.rs

mod common;
use crate::common::builders::{GraphBuilder, LedgerBuilder};
use crate::common::init_tracing;

use std::sync::Arc;

use stackbuild::dag::{DependencyGraph, Readiness, Scheduler};
use stackbuild::engine::BuildReport;
use stackbuild::ledger::Ledger;
use stackbuild::types::{FailureType, PackageStatus};

/// A <- B <- C chain plus an independent D.
fn chain_graph() -> Arc<DependencyGraph> {
    Arc::new(
        GraphBuilder::new()
            .nodes(&["A", "B", "C", "D"])
            .edge("B", "A")
            .edge("C", "B")
            .build(),
    )
}

fn chain_ledger() -> Ledger {
    LedgerBuilder::new(&["A", "D", "B", "C"]).build()
}

fn scheduled(scheduler: &mut Scheduler, in_flight: usize, parallel: usize) -> Vec<String> {
    scheduler
        .schedule(in_flight, parallel, true)
        .newly_scheduled
        .into_iter()
        .map(|j| j.package)
        .collect()
}

#[test]
fn only_packages_with_satisfied_deps_are_dispatched() {
    init_tracing();
    let mut scheduler = Scheduler::new(chain_graph(), chain_ledger());

    assert_eq!(scheduled(&mut scheduler, 0, 4), vec!["A", "D"]);
    assert_eq!(scheduler.ledger().status_of("A"), Some(PackageStatus::Building));
    assert_eq!(scheduler.readiness("B"), Some(Readiness::Waiting));

    scheduler.step_completion("A", BuildReport::success(None));
    assert_eq!(scheduled(&mut scheduler, 1, 4), vec!["B"]);
}

#[test]
fn dispatch_never_exceeds_parallel() {
    let graph = Arc::new(GraphBuilder::new().nodes(&["a", "b", "c", "d"]).build());
    let ledger = LedgerBuilder::new(&["a", "b", "c", "d"]).build();
    let mut scheduler = Scheduler::new(graph, ledger);

    assert_eq!(scheduled(&mut scheduler, 0, 2), vec!["a", "b"]);
    assert!(scheduled(&mut scheduler, 2, 2).is_empty());
    assert_eq!(scheduled(&mut scheduler, 1, 2), vec!["c"]);
}

#[test]
fn jobs_carry_version_attempt_and_run_id() {
    let mut graph = DependencyGraph::new();
    graph.add_node("nova", true, "29.0.0");
    let ledger = LedgerBuilder::new(&["nova"]).run_id("run-1").build();
    let mut scheduler = Scheduler::new(Arc::new(graph), ledger);

    let step = scheduler.schedule(0, 1, true);
    let job = &step.newly_scheduled[0];
    assert_eq!(job.version, "29.0.0");
    assert_eq!(job.attempt, 1);
    assert_eq!(job.run_id, "run-1");
}

#[test]
fn failure_blocks_the_whole_downstream_chain() {
    let mut scheduler = Scheduler::new(chain_graph(), chain_ledger());
    scheduled(&mut scheduler, 0, 4);

    let step = scheduler.step_completion(
        "A",
        BuildReport::failed(FailureType::BuildFailed, "boom", None),
    );
    assert_eq!(step.newly_failed, vec!["A"]);

    let step = scheduler.schedule(1, 4, true);
    assert_eq!(step.newly_blocked, vec!["B", "C"]);
    assert!(step.newly_scheduled.is_empty());

    let ledger = scheduler.ledger();
    assert!(ledger.get("B").unwrap().failure_message.contains("A"));
    assert!(ledger.get("C").unwrap().failure_message.contains("B"));
}

#[test]
fn skipped_dependency_blocks_unless_allowed() {
    let graph = Arc::new(GraphBuilder::new().nodes(&["lib", "app"]).edge("app", "lib").build());

    let strict = LedgerBuilder::new(&["lib", "app"])
        .with_status("lib", PackageStatus::Skipped)
        .build();
    let mut scheduler = Scheduler::new(graph.clone(), strict);
    let step = scheduler.schedule(0, 2, true);
    assert_eq!(step.newly_blocked, vec!["app"]);

    let lenient = LedgerBuilder::new(&["lib", "app"])
        .with_status("lib", PackageStatus::Skipped)
        .allow_skipped_deps(true)
        .build();
    let mut scheduler = Scheduler::new(graph, lenient);
    assert_eq!(scheduled(&mut scheduler, 0, 2), vec!["app"]);
}

#[test]
fn dependencies_outside_the_run_are_ignored() {
    let graph = Arc::new(
        GraphBuilder::new()
            .nodes(&["app", "lib"])
            .edge("app", "lib")
            .edge("app", "python3-ghost")
            .build(),
    );
    let ledger = LedgerBuilder::new(&["app"]).build();
    let mut scheduler = Scheduler::new(graph, ledger);

    assert_eq!(scheduled(&mut scheduler, 0, 1), vec!["app"]);
}

#[test]
fn halts_after_max_failures_and_drains() {
    init_tracing();
    let graph = Arc::new(GraphBuilder::new().nodes(&["p1", "p2", "p3"]).build());
    let ledger = LedgerBuilder::new(&["p1", "p2", "p3"]).max_failures(1).build();
    let mut scheduler = Scheduler::new(graph, ledger);

    assert_eq!(scheduled(&mut scheduler, 0, 2), vec!["p1", "p2"]);

    let step = scheduler.step_completion(
        "p1",
        BuildReport::failed(FailureType::FetchFailed, "no tarball", None),
    );
    assert!(step.halted);

    let step = scheduler.schedule(1, 2, true);
    assert!(step.halted);
    assert!(step.newly_scheduled.is_empty());

    // The in-flight build is still recorded.
    scheduler.step_completion("p2", BuildReport::success(None));
    assert_eq!(scheduler.ledger().status_of("p2"), Some(PackageStatus::Success));
    assert_eq!(scheduler.ledger().status_of("p3"), Some(PackageStatus::Pending));
}

#[test]
fn shutdown_only_derives_blocked() {
    let mut scheduler = Scheduler::new(chain_graph(), chain_ledger());
    let step = scheduler.schedule(0, 4, false);
    assert!(step.newly_scheduled.is_empty());
    assert!(step.newly_failed.is_empty());
    assert_eq!(scheduler.ledger().pending().len(), 4);
}

#[test]
fn completion_for_non_building_package_is_ignored() {
    let mut scheduler = Scheduler::new(chain_graph(), chain_ledger());
    let step = scheduler.step_completion("A", BuildReport::success(None));
    assert_eq!(step, Default::default());
    assert_eq!(scheduler.ledger().status_of("A"), Some(PackageStatus::Pending));

    let step = scheduler.step_completion("ghost", BuildReport::success(None));
    assert!(step.newly_failed.is_empty());
}

#[test]
fn allowed_cycle_edges_are_not_waited_on() {
    let graph = Arc::new(
        GraphBuilder::new()
            .nodes(&["A", "B", "C"])
            .edge("A", "B")
            .edge("B", "A")
            .edge("C", "A")
            .build(),
    );
    assert_eq!(graph.build_order_with_cycles(), vec!["A", "B", "C"]);
    let ledger = LedgerBuilder::new(&["A", "B", "C"]).build();
    let mut scheduler =
        Scheduler::new(graph.clone(), ledger).with_ignored_edges(graph.cycle_edges());

    assert_eq!(scheduled(&mut scheduler, 0, 4), vec!["A", "B"]);
    scheduler.step_completion("A", BuildReport::success(None));
    scheduler.step_completion("B", BuildReport::success(None));
    assert_eq!(scheduled(&mut scheduler, 0, 4), vec!["C"]);
}

#[test]
fn stalled_cycle_fails_with_cycle_type() {
    init_tracing();
    let graph = Arc::new(
        GraphBuilder::new()
            .nodes(&["A", "B"])
            .edge("A", "B")
            .edge("B", "A")
            .build(),
    );
    let ledger = LedgerBuilder::new(&["A", "B"]).build();
    let mut scheduler = Scheduler::new(graph, ledger);

    let step = scheduler.schedule(0, 2, true);
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(step.newly_failed, vec!["A", "B"]);

    let ledger = scheduler.ledger();
    assert_eq!(ledger.get("A").unwrap().failure_type, Some(FailureType::Cycle));
    assert!(ledger.is_complete());
}
