// src/ledger/resume.rs

//! Resuming a prior run.
//!
//! The dependency graph is always rebuilt; a prior ledger only contributes
//! per-package history, matched by name:
//!
//! - SUCCESS and SKIPPED are kept as-is.
//! - FAILED follows the [`FailedPolicy`].
//! - BUILDING (interrupted) and BLOCKED (derived) go back to PENDING.
//! - Packages no longer requested are dropped; new ones start PENDING.

use tracing::{info, warn};

use crate::errors::{Result, StackbuildError};
use crate::ledger::store::LedgerStore;
use crate::ledger::{Ledger, PackageState, RunHeader, RunPolicy};
use crate::plan::PlanReport;
use crate::types::{PackageName, PackageStatus};

/// What happens to FAILED packages when a run is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailedPolicy {
    /// FAILED -> PENDING; history (attempt count) is kept.
    Retry,
    /// FAILED -> SKIPPED.
    #[default]
    Skip,
    /// Stay FAILED and never dispatch.
    Keep,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeRequest {
    pub enabled: bool,
    /// Explicit run to resume; the most recent run otherwise.
    pub run_id: Option<String>,
    pub failed: FailedPolicy,
}

impl Ledger {
    /// Reset non-final statuses of a loaded ledger for another pass.
    pub fn apply_resume(&mut self, policy: FailedPolicy) {
        let mut retried = 0usize;
        let mut skipped = Vec::new();

        for state in self.packages.values_mut() {
            match state.status {
                PackageStatus::Building => {
                    info!(package = %state.name, attempt = state.attempt, "interrupted build; back to pending");
                    state.status = PackageStatus::Pending;
                }
                PackageStatus::Blocked => {
                    state.status = PackageStatus::Pending;
                    state.failure_message.clear();
                }
                PackageStatus::Failed => match policy {
                    FailedPolicy::Retry => {
                        state.status = PackageStatus::Pending;
                        state.failure_type = None;
                        state.failure_message.clear();
                        retried += 1;
                    }
                    FailedPolicy::Skip => skipped.push(state.name.clone()),
                    FailedPolicy::Keep => {}
                },
                PackageStatus::Pending | PackageStatus::Success | PackageStatus::Skipped => {}
            }
        }

        for name in &skipped {
            let previous = self
                .get(name)
                .and_then(|s| s.failure_type)
                .map(|ft| ft.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            self.mark_skipped(name, format!("skipped on resume after {previous} failure"));
        }

        self.completed_at = None;
        info!(
            run_id = %self.run_id,
            retried,
            skipped = skipped.len(),
            ?policy,
            "resume policy applied"
        );
    }

    /// Align the package map with a fresh build order, keeping history of
    /// packages that are still requested.
    pub fn reconcile(&mut self, build_order: Vec<PackageName>) {
        let dropped: Vec<PackageName> = self
            .packages
            .keys()
            .filter(|name| !build_order.contains(name))
            .cloned()
            .collect();
        for name in &dropped {
            info!(package = %name, "no longer requested; dropping from ledger");
            self.packages.remove(name);
        }

        for name in &build_order {
            if !self.packages.contains_key(name) {
                info!(package = %name, "newly requested; adding as pending");
                self.packages
                    .insert(name.clone(), PackageState::new(name.clone()));
            }
        }

        self.total_packages = self.packages.len();
        self.build_order = build_order;
    }
}

/// Load the ledger a resume request points at.
///
/// - named run missing or unreadable: [`StackbuildError::ResumeError`]
/// - no named run and no prior run at all: `Ok(None)` (fresh start)
pub fn load_for_resume(store: &LedgerStore, request: &ResumeRequest) -> Result<Option<Ledger>> {
    if !request.enabled {
        return Ok(None);
    }

    match &request.run_id {
        Some(run_id) => match store.load(run_id) {
            Some(ledger) => Ok(Some(ledger)),
            None => Err(StackbuildError::ResumeError(format!(
                "no usable ledger for run '{run_id}' under {}",
                store.runs_root().display()
            ))),
        },
        None => match store.latest_run_id() {
            Some(run_id) => Ok(store.load(&run_id)),
            None => {
                info!("resume requested but no prior run found; starting fresh");
                Ok(None)
            }
        },
    }
}

/// Produce the ledger for this run: a resumed one when requested and
/// available, a fresh one otherwise. Planning results (order, cycles,
/// missing dependencies) always come from `plan`.
pub fn prepare_ledger(
    store: &LedgerStore,
    resume: &ResumeRequest,
    header: RunHeader,
    policy: RunPolicy,
    plan: &PlanReport,
) -> Result<Ledger> {
    let mut ledger = match load_for_resume(store, resume)? {
        Some(mut prior) => {
            if prior.target != header.target || prior.series != header.series {
                warn!(
                    run_id = %prior.run_id,
                    prior_target = %prior.target,
                    prior_series = %prior.series,
                    target = %header.target,
                    series = %header.series,
                    "resumed run was planned for a different target; keeping its identity"
                );
            }
            info!(run_id = %prior.run_id, "resuming run");
            prior.apply_resume(resume.failed);
            prior.reconcile(plan.build_order.clone());
            prior.missing_deps.clear();
            prior.apply_policy(policy);
            prior
        }
        None => {
            info!(run_id = %header.run_id, packages = plan.build_order.len(), "starting fresh run");
            Ledger::new(header, policy, plan.build_order.clone())
        }
    };

    ledger.cycles = plan.cycles.clone();
    for entry in plan.missing.values() {
        ledger.add_missing_dep(entry.clone());
    }

    Ok(ledger)
}
