// tests/reports.rs

mod common;
use crate::common::builders::LedgerBuilder;
use crate::common::init_tracing;

use std::error::Error;
use std::path::Path;

use stackbuild::fs::mock::MockFileSystem;
use stackbuild::fs::FileSystem;
use stackbuild::ledger::{Ledger, MissingDependency};
use stackbuild::outcome_exit_code;
use stackbuild::report::{write_reports, RunSummary};
use stackbuild::types::{FailureType, PackageStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn mixed_ledger() -> Ledger {
    let mut ledger = LedgerBuilder::new(&["core", "api", "db", "app", "docs"])
        .with_status("core", PackageStatus::Success)
        .with_status("db", PackageStatus::Success)
        .build();
    ledger.mark_started("api");
    ledger.mark_failed(
        "api",
        FailureType::PatchFailed,
        "quilt push failed",
        Some("/runs/r/logs/api/attempt-1.log".into()),
    );
    ledger.mark_blocked("app", "api");
    ledger.mark_skipped("docs", "not needed");
    ledger.add_missing_dep(MissingDependency {
        binary_name: "python3-ghost".to_string(),
        source_package: None,
        required_by: vec!["app".to_string()],
        suggested_action: "add it".to_string(),
    });
    ledger.mark_completed_if_done();
    ledger
}

#[test]
fn summary_counts_every_status() {
    let summary = RunSummary::from_ledger(&mixed_ledger());

    assert_eq!(summary.total_packages, 5);
    assert_eq!(summary.counts["success"], 2);
    assert_eq!(summary.counts["failed"], 1);
    assert_eq!(summary.counts["blocked"], 1);
    assert_eq!(summary.counts["skipped"], 1);
    assert_eq!(summary.counts["pending"], 0);
    assert_eq!(summary.counts["building"], 0);
    assert!(summary.completed_at.is_some());

    let patch = &summary.failures["patch_failed"];
    assert_eq!(patch.len(), 1);
    assert_eq!(patch[0].package, "api");
    assert_eq!(summary.missing_deps.len(), 1);
}

#[test]
fn markdown_lists_failures_and_order() {
    let md = RunSummary::from_ledger(&mixed_ledger()).to_markdown();

    assert!(md.starts_with("# Build run 20260101T000000.000Z"));
    assert!(md.contains("| failed | 1 |"));
    assert!(md.contains("### patch_failed (1)"));
    assert!(md.contains("`api`: quilt push failed (log: /runs/r/logs/api/attempt-1.log)"));
    assert!(md.contains("`python3-ghost` required by app: add it"));
    assert!(md.contains("1. core"));
}

#[test]
fn reports_are_written_under_run_dir() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let ledger = mixed_ledger();

    let paths = write_reports(&fs, Path::new("/runs/r"), &ledger)?;

    assert_eq!(paths.json, Path::new("/runs/r/reports/summary.json"));
    assert_eq!(paths.markdown, Path::new("/runs/r/reports/summary.md"));

    let json: serde_json::Value = serde_json::from_str(&fs.read_to_string(&paths.json)?)?;
    assert_eq!(json["run_id"], "20260101T000000.000Z");
    assert_eq!(json["counts"]["failed"], 1);
    assert_eq!(json["failures"]["patch_failed"][0]["package"], "api");

    assert!(fs.read_to_string(&paths.markdown)?.contains("## Failures"));
    Ok(())
}

#[test]
fn exit_code_reflects_outcome() {
    let clean = LedgerBuilder::new(&["a", "b"])
        .with_status("a", PackageStatus::Success)
        .with_status("b", PackageStatus::Skipped)
        .build();
    assert_eq!(outcome_exit_code(&clean), 0);

    assert_eq!(outcome_exit_code(&mixed_ledger()), 13);

    let interrupted = LedgerBuilder::new(&["a", "b"])
        .with_status("a", PackageStatus::Success)
        .build();
    assert_eq!(outcome_exit_code(&interrupted), 13);
}
