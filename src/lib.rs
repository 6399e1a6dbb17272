// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod index;
pub mod ledger;
pub mod logging;
pub mod plan;
pub mod report;
pub mod request;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::ConfigFile;
use crate::dag::{Scheduler, SoftDependencyExclusions};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::{exit_code, Result};
use crate::exec::{CommandBuildStep, RealExecutorBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::index::PackageIndex;
use crate::ledger::resume::prepare_ledger;
use crate::ledger::store::new_run_id;
use crate::ledger::{Ledger, LedgerStore};
use crate::plan::PlanReport;
use crate::request::BuildRequest;
use crate::types::PackageStatus;

/// Result of one invocation.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub ledger: Ledger,
    pub dry_run: bool,
    pub exit_code: i32,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the effective request
/// - package index, planning and the cycle / missing checks
/// - ledger creation or resume
/// - scheduler / core / runtime
/// - executor
/// - Ctrl-C handling
/// - end-of-run reports
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    let cfg = load_and_validate(&args.config)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let request = BuildRequest::from_sources(&args, &cfg, fs.as_ref())?;
    let index = PackageIndex::load(fs.as_ref(), &request.index_path)?;
    let exclusions = SoftDependencyExclusions::from_section(&cfg.exclusions);

    let plan = plan::plan(&index, &request.packages, &exclusions);
    for warning in &plan.warnings {
        warn!("{warning}");
    }
    plan.check(request.allow_cycles, request.allow_missing)?;

    let store = LedgerStore::new(fs.clone(), &request.runs_root);
    let header = request.header(new_run_id(Utc::now()));
    let ledger = prepare_ledger(&store, &request.resume, header, request.policy, &plan)?;

    if request.dry_run {
        print_dry_run(&plan, &ledger);
        return Ok(RunOutcome {
            run_id: ledger.run_id.clone(),
            ledger,
            dry_run: true,
            exit_code: exit_code::SUCCESS,
        });
    }

    execute(&cfg, &request, &plan, store, fs, ledger).await
}

async fn execute(
    cfg: &ConfigFile,
    request: &BuildRequest,
    plan: &PlanReport,
    store: LedgerStore,
    fs: Arc<dyn FileSystem>,
    ledger: Ledger,
) -> Result<RunOutcome> {
    let run_dir = store.run_dir(&ledger.run_id);

    let mut step = CommandBuildStep::new(cfg.build.command.clone(), run_dir.join("logs"))
        .with_exit_codes(cfg.build.exit_codes.clone());
    if let Some(dir) = &cfg.build.workdir {
        step = step.with_workdir(dir);
    }

    let mut scheduler = Scheduler::new(plan.graph.clone(), ledger);
    if request.allow_cycles {
        scheduler = scheduler.with_ignored_edges(plan.cycle_edges.iter().cloned());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let executor = RealExecutorBackend::new(rt_tx.clone(), Arc::new(step));

    // Ctrl-C → stop dispatching, let in-flight builds finish.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        parallel: request.policy.parallel,
    };

    // Construct the pure core runtime (single source of truth for semantics).
    let core = CoreRuntime::new(scheduler, options);

    // Construct the async IO shell around the core.
    let runtime = Runtime::new(core, rt_rx, executor, store);
    let ledger = runtime.run().await?;

    if let Err(err) = report::write_reports(fs.as_ref(), &run_dir, &ledger) {
        warn!(run_id = %ledger.run_id, error = %err, "failed to write reports");
    }

    let code = outcome_exit_code(&ledger);
    info!(run_id = %ledger.run_id, exit_code = code, "stackbuild done");
    Ok(RunOutcome {
        run_id: ledger.run_id.clone(),
        ledger,
        dry_run: false,
        exit_code: code,
    })
}

/// 0 when every package ended SUCCESS or SKIPPED; otherwise the run left
/// work behind and is resumable.
pub fn outcome_exit_code(ledger: &Ledger) -> i32 {
    let clean = ledger
        .packages
        .values()
        .all(|s| matches!(s.status, PackageStatus::Success | PackageStatus::Skipped));
    if clean && !ledger.should_stop() {
        exit_code::SUCCESS
    } else {
        exit_code::BUILD_FAILED
    }
}

/// Dry-run output: the plan grouped into waves, plus what a resume would
/// keep.
fn print_dry_run(plan: &PlanReport, ledger: &Ledger) {
    println!("stackbuild dry-run");
    println!("  run_id = {}", ledger.run_id);
    println!("  target = {} / {}", ledger.target, ledger.series);
    println!("  packages = {}", plan.build_order.len());
    println!();

    for (wave, names) in plan.wave_groups().iter().enumerate() {
        println!("wave {wave} ({}):", names.len());
        for name in names {
            let status = ledger
                .status_of(name)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let deps = plan.graph.dependencies_of(name);
            if deps.is_empty() {
                println!("  - {name} [{status}]");
            } else {
                println!("  - {name} [{status}] after: {}", deps.join(", "));
            }
        }
    }

    if !plan.excluded_edges.is_empty() {
        println!();
        println!("soft dependencies ignored:");
        for edge in &plan.excluded_edges {
            println!("  - {} -> {}", edge.dependent, edge.dependency);
        }
    }

    if !plan.cycles.is_empty() {
        println!();
        println!("cycles:");
        for cycle in &plan.cycles {
            println!("  - {}", cycle.join(" -> "));
        }
    }

    if !plan.missing.is_empty() {
        println!();
        println!("missing dependencies:");
        for m in plan.missing.values() {
            println!(
                "  - {} (required by {}): {}",
                m.binary_name,
                m.required_by.join(", "),
                m.suggested_action
            );
        }
    }

    debug!("dry-run complete (no execution)");
}
