// tests/resume.rs

mod common;
use crate::common::builders::{GraphBuilder, LedgerBuilder};
use crate::common::init_tracing;

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;

use stackbuild::dag::Scheduler;
use stackbuild::errors::StackbuildError;
use stackbuild::fs::mock::MockFileSystem;
use stackbuild::index::PackageIndex;
use stackbuild::dag::SoftDependencyExclusions;
use stackbuild::ledger::resume::{load_for_resume, prepare_ledger};
use stackbuild::ledger::{FailedPolicy, LedgerStore, ResumeRequest, RunHeader, RunPolicy};
use stackbuild::plan::plan;
use stackbuild::types::{BuildType, FailureType, PackageStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn header(run_id: &str) -> RunHeader {
    RunHeader {
        run_id: run_id.to_string(),
        target: "caracal".to_string(),
        series: "noble".to_string(),
        build_type: BuildType::Release,
    }
}

fn resume(failed: FailedPolicy) -> ResumeRequest {
    ResumeRequest {
        enabled: true,
        run_id: None,
        failed,
    }
}

/// Index with independent sources `pkg1`, `pkg2`, `pkg3`.
fn flat_index() -> PackageIndex {
    let mut index = PackageIndex::new();
    for name in ["pkg1", "pkg2", "pkg3"] {
        index.add_source(name, "1.0");
    }
    index
}

fn requested(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn retry_failed_resets_to_pending_and_keeps_attempt() {
    init_tracing();
    let mut ledger = LedgerBuilder::new(&["pkg1", "pkg2"])
        .with_status("pkg1", PackageStatus::Failed)
        .with_status("pkg2", PackageStatus::Success)
        .build();

    ledger.apply_resume(FailedPolicy::Retry);

    let pkg1 = ledger.get("pkg1").unwrap();
    assert_eq!(pkg1.status, PackageStatus::Pending);
    assert_eq!(pkg1.attempt, 1);
    assert!(pkg1.failure_type.is_none());
    assert_eq!(ledger.status_of("pkg2"), Some(PackageStatus::Success));

    // The next start bumps the attempt, and pkg2 is never dispatched again.
    let graph = Arc::new(GraphBuilder::new().nodes(&["pkg1", "pkg2"]).build());
    let mut scheduler = Scheduler::new(graph, ledger);
    let step = scheduler.schedule(0, 4, true);
    let names: Vec<_> = step.newly_scheduled.iter().map(|j| j.package.as_str()).collect();
    assert_eq!(names, vec!["pkg1"]);
    assert_eq!(step.newly_scheduled[0].attempt, 2);
}

#[test]
fn skip_failed_marks_skipped_with_reason() {
    let mut ledger = LedgerBuilder::new(&["pkg1"])
        .with_status("pkg1", PackageStatus::Failed)
        .build();

    ledger.apply_resume(FailedPolicy::Skip);

    let pkg1 = ledger.get("pkg1").unwrap();
    assert_eq!(pkg1.status, PackageStatus::Skipped);
    assert!(pkg1.failure_message.contains("build_failed"));
}

#[test]
fn keep_failed_stays_failed() {
    let mut ledger = LedgerBuilder::new(&["pkg1"])
        .with_status("pkg1", PackageStatus::Failed)
        .build();

    ledger.apply_resume(FailedPolicy::Keep);
    assert_eq!(ledger.status_of("pkg1"), Some(PackageStatus::Failed));
}

#[test]
fn interrupted_and_blocked_go_back_to_pending() {
    let mut ledger = LedgerBuilder::new(&["a", "b"])
        .with_status("a", PackageStatus::Building)
        .with_status("b", PackageStatus::Blocked)
        .build();
    ledger.mark_completed_if_done();

    ledger.apply_resume(FailedPolicy::Skip);

    assert_eq!(ledger.status_of("a"), Some(PackageStatus::Pending));
    assert_eq!(ledger.get("a").unwrap().attempt, 1);
    assert_eq!(ledger.status_of("b"), Some(PackageStatus::Pending));
    assert!(ledger.completed_at.is_none());
}

#[test]
fn reconcile_keeps_history_by_name() {
    let mut ledger = LedgerBuilder::new(&["old", "kept"])
        .with_status("kept", PackageStatus::Success)
        .build();

    ledger.reconcile(requested(&["kept", "new"]));

    assert!(!ledger.contains("old"));
    assert_eq!(ledger.status_of("kept"), Some(PackageStatus::Success));
    assert_eq!(ledger.status_of("new"), Some(PackageStatus::Pending));
    assert_eq!(ledger.total_packages, 2);
    assert_eq!(ledger.build_order, vec!["kept", "new"]);
}

#[test]
fn named_run_that_does_not_exist_is_an_error() {
    let store = LedgerStore::new(Arc::new(MockFileSystem::new()), "/runs");
    let request = ResumeRequest {
        enabled: true,
        run_id: Some("nope".to_string()),
        failed: FailedPolicy::Skip,
    };

    match load_for_resume(&store, &request) {
        Err(err @ StackbuildError::ResumeError(_)) => assert_eq!(err.exit_code(), 14),
        other => panic!("expected resume error, got {other:?}"),
    }
}

#[test]
fn unnamed_resume_without_prior_run_starts_fresh() -> TestResult {
    let store = LedgerStore::new(Arc::new(MockFileSystem::new()), "/runs");
    assert!(load_for_resume(&store, &resume(FailedPolicy::Skip))?.is_none());

    let report = plan(&flat_index(), &requested(&["pkg1"]), &SoftDependencyExclusions::empty());
    let ledger = prepare_ledger(
        &store,
        &resume(FailedPolicy::Skip),
        header("fresh"),
        RunPolicy::default(),
        &report,
    )?;
    assert_eq!(ledger.run_id, "fresh");
    assert_eq!(ledger.pending(), vec!["pkg1"]);
    Ok(())
}

#[test]
fn prepare_ledger_resumes_latest_run() -> TestResult {
    init_tracing();
    let store = LedgerStore::new(Arc::new(MockFileSystem::new()), "/runs");

    let mut prior = LedgerBuilder::new(&["pkg1", "pkg2"])
        .run_id("20250101T000000.000Z")
        .build();
    prior.mark_started("pkg1");
    prior.mark_failed("pkg1", FailureType::BuildFailed, "boom", None);
    prior.mark_started("pkg2");
    prior.mark_success("pkg2", None);
    store.save(&prior)?;

    let report = plan(
        &flat_index(),
        &requested(&["pkg1", "pkg2", "pkg3"]),
        &SoftDependencyExclusions::empty(),
    );
    let policy = RunPolicy {
        parallel: 3,
        ..RunPolicy::default()
    };
    let ledger = prepare_ledger(
        &store,
        &resume(FailedPolicy::Retry),
        header("20250202T000000.000Z"),
        policy,
        &report,
    )?;

    assert_eq!(ledger.run_id, "20250101T000000.000Z");
    assert_eq!(ledger.status_of("pkg1"), Some(PackageStatus::Pending));
    assert_eq!(ledger.status_of("pkg2"), Some(PackageStatus::Success));
    assert_eq!(ledger.status_of("pkg3"), Some(PackageStatus::Pending));
    assert_eq!(ledger.parallel, 3);
    assert_eq!(ledger.build_order, vec!["pkg1", "pkg2", "pkg3"]);
    Ok(())
}

#[test]
fn fresh_ledger_carries_plan_findings() -> TestResult {
    let mut index = flat_index();
    let idx_toml = r#"
        [source.app]
        version = "2.0"
        [source.app.binary.app-bin]
        depends = ["python3-ghost"]
    "#;
    let extra = PackageIndex::from_toml_str(idx_toml)?;
    for bin in extra.binaries_for_source("app") {
        index.add_binary(bin.clone());
    }

    let store = LedgerStore::new(Arc::new(MockFileSystem::new()), "/runs");
    let report = plan(&index, &requested(&["app"]), &SoftDependencyExclusions::empty());
    let ledger = prepare_ledger(
        &store,
        &ResumeRequest::default(),
        header("r"),
        RunPolicy::default(),
        &report,
    )?;

    let expected: BTreeMap<_, _> = report.missing.clone();
    assert_eq!(ledger.missing_deps, expected);
    assert_eq!(ledger.missing_deps["python3-ghost"].required_by, vec!["app"]);
    Ok(())
}
