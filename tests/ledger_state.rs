// tests/ledger_state.rs

mod common;
use crate::common::builders::LedgerBuilder;
use crate::common::init_tracing;

use std::error::Error;
use std::path::PathBuf;

use stackbuild::ledger::{transition_allowed, Ledger, MissingDependency};
use stackbuild::types::{FailureType, PackageStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn missing(binary: &str, required_by: &[&str]) -> MissingDependency {
    MissingDependency {
        binary_name: binary.to_string(),
        source_package: None,
        required_by: required_by.iter().map(|s| s.to_string()).collect(),
        suggested_action: "add it".to_string(),
    }
}

#[test]
fn fresh_ledger_is_all_pending() {
    let ledger = LedgerBuilder::new(&["C", "B", "A"]).build();

    assert_eq!(ledger.total_packages, 3);
    assert_eq!(ledger.pending(), vec!["A", "B", "C"]);
    assert_eq!(ledger.build_order, vec!["C", "B", "A"]);
    assert!(!ledger.is_complete());
    assert!(ledger.completed_at.is_none());
}

#[test]
fn build_lifecycle_records_attempt_and_timing() {
    init_tracing();
    let mut ledger = LedgerBuilder::new(&["nova"]).build();

    ledger.mark_started("nova");
    let state = ledger.get("nova").unwrap();
    assert_eq!(state.status, PackageStatus::Building);
    assert_eq!(state.attempt, 1);
    assert!(state.start_time.is_some());

    ledger.mark_success("nova", Some(PathBuf::from("logs/nova/attempt-1.log")));
    let state = ledger.get("nova").unwrap();
    assert_eq!(state.status, PackageStatus::Success);
    assert!(state.end_time.is_some());
    assert_eq!(state.log_path, Some(PathBuf::from("logs/nova/attempt-1.log")));
    assert!(ledger.is_complete());
}

#[test]
fn failure_records_type_and_message() {
    let mut ledger = LedgerBuilder::new(&["nova"]).build();
    ledger.mark_started("nova");
    ledger.mark_failed("nova", FailureType::PatchFailed, "quilt push failed", None);

    let state = ledger.get("nova").unwrap();
    assert_eq!(state.status, PackageStatus::Failed);
    assert_eq!(state.failure_type, Some(FailureType::PatchFailed));
    assert_eq!(state.failure_message, "quilt push failed");
    assert_eq!(ledger.failed(), vec!["nova"]);
}

#[test]
fn blocked_message_names_dependency() {
    let mut ledger = LedgerBuilder::new(&["nova", "oslo"]).build();
    ledger.mark_blocked("nova", "oslo");

    let state = ledger.get("nova").unwrap();
    assert_eq!(state.status, PackageStatus::Blocked);
    assert!(state.failure_message.contains("oslo"));
}

#[test]
fn illegal_transitions_are_ignored() {
    init_tracing();
    let mut ledger = LedgerBuilder::new(&["nova"])
        .with_status("nova", PackageStatus::Success)
        .build();

    ledger.mark_started("nova");
    ledger.mark_failed("nova", FailureType::BuildFailed, "late failure", None);
    ledger.mark_blocked("nova", "x");
    assert_eq!(ledger.status_of("nova"), Some(PackageStatus::Success));
    assert_eq!(ledger.get("nova").unwrap().attempt, 1);

    // Unknown packages are a no-op too.
    ledger.mark_started("ghost");
    assert!(!ledger.contains("ghost"));
}

#[test]
fn transition_table_matches_lifecycle() {
    use PackageStatus::*;
    assert!(transition_allowed(Pending, Building));
    assert!(transition_allowed(Building, Success));
    assert!(transition_allowed(Building, Failed));
    assert!(transition_allowed(Pending, Blocked));
    assert!(transition_allowed(Failed, Skipped));
    assert!(!transition_allowed(Success, Building));
    assert!(!transition_allowed(Blocked, Building));
    assert!(!transition_allowed(Pending, Success));
}

#[test]
fn missing_deps_merge_required_by_in_order() {
    let mut ledger = LedgerBuilder::new(&["nova", "glance", "cinder"]).build();

    ledger.add_missing_dep(missing("python3-ghost", &["nova", "glance"]));
    ledger.add_missing_dep(missing("python3-ghost", &["cinder", "nova"]));

    assert_eq!(ledger.missing_deps.len(), 1);
    assert_eq!(
        ledger.missing_deps["python3-ghost"].required_by,
        vec!["nova", "glance", "cinder"]
    );
}

#[test]
fn fail_fast_stops_after_first_failure() {
    let mut ledger = LedgerBuilder::new(&["a", "b"]).keep_going(false).build();
    assert!(!ledger.should_stop());

    ledger.mark_started("a");
    ledger.mark_failed("a", FailureType::BuildFailed, "boom", None);
    assert!(ledger.should_stop());
}

#[test]
fn max_failures_stops_exactly_at_threshold() {
    let mut ledger = LedgerBuilder::new(&["pkg1", "pkg2", "pkg3"])
        .keep_going(true)
        .max_failures(2)
        .build();

    ledger.mark_started("pkg1");
    ledger.mark_failed("pkg1", FailureType::BuildFailed, "boom", None);
    assert!(!ledger.should_stop());

    ledger.mark_started("pkg2");
    ledger.mark_failed("pkg2", FailureType::FetchFailed, "boom", None);
    assert!(ledger.should_stop());
}

#[test]
fn unlimited_failures_never_stop() {
    let mut ledger = LedgerBuilder::new(&["a", "b", "c"]).build();
    for name in ["a", "b", "c"] {
        ledger.mark_started(name);
        ledger.mark_failed(name, FailureType::Unknown, "boom", None);
    }
    assert!(!ledger.should_stop());
}

#[test]
fn completion_is_stamped_once_terminal() {
    let mut ledger = LedgerBuilder::new(&["a", "b"]).build();
    ledger.mark_started("a");
    ledger.mark_completed_if_done();
    assert!(ledger.completed_at.is_none());

    ledger.mark_success("a", None);
    ledger.mark_skipped("b", "not wanted");
    assert!(ledger.is_complete());
    ledger.mark_completed_if_done();
    assert!(ledger.completed_at.is_some());
}

#[test]
fn json_round_trip_preserves_every_field() -> TestResult {
    let mut ledger = LedgerBuilder::new(&["a", "b", "c", "d", "e"])
        .with_status("a", PackageStatus::Success)
        .with_status("b", PackageStatus::Failed)
        .with_status("c", PackageStatus::Skipped)
        .with_status("d", PackageStatus::Blocked)
        .build();
    ledger.add_missing_dep(missing("python3-ghost", &["e"]));
    ledger.cycles = vec![vec!["x".to_string(), "y".to_string(), "x".to_string()]];

    let json = serde_json::to_string_pretty(&ledger)?;
    let back: Ledger = serde_json::from_str(&json)?;
    assert_eq!(back, ledger);
    Ok(())
}

#[test]
fn unknown_failure_type_loads_as_unknown() -> TestResult {
    let mut ledger = LedgerBuilder::new(&["a"])
        .with_status("a", PackageStatus::Failed)
        .build();

    let json = serde_json::to_string(&ledger)?.replace("build_failed", "quantum_flux");
    let back: Ledger = serde_json::from_str(&json)?;
    assert_eq!(back.get("a").unwrap().failure_type, Some(FailureType::Unknown));

    // After normalisation the record round-trips.
    ledger.packages.get_mut("a").unwrap().failure_type = Some(FailureType::Unknown);
    assert_eq!(back, ledger);
    Ok(())
}

#[test]
fn failure_type_exit_code_defaults() {
    assert_eq!(FailureType::from_exit_code(3), FailureType::FetchFailed);
    assert_eq!(FailureType::from_exit_code(4), FailureType::PatchFailed);
    assert_eq!(FailureType::from_exit_code(5), FailureType::MissingDep);
    assert_eq!(FailureType::from_exit_code(6), FailureType::Cycle);
    assert_eq!(FailureType::from_exit_code(7), FailureType::BuildFailed);
    assert_eq!(FailureType::from_exit_code(8), FailureType::PolicyBlocked);
    assert_eq!(FailureType::from_exit_code(1), FailureType::Unknown);
}
