// src/ledger/mod.rs

//! Build ledger: the persisted, resumable per-run record of every package's
//! lifecycle.
//!
//! - [`Ledger`] holds run metadata, policy knobs and one [`PackageState`]
//!   per package. All `mark_*` operations are total: an unknown package or
//!   an illegal transition is logged and leaves the package untouched.
//! - [`store`] persists ledgers under `<runs_root>/<run_id>/state/`.
//! - [`resume`] reconciles a prior ledger with a fresh planning pass.

pub mod resume;
pub mod store;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{BuildType, FailureType, PackageName, PackageStatus};

pub use resume::{FailedPolicy, ResumeRequest};
pub use store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageState {
    pub name: PackageName,
    pub status: PackageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<FailureType>,
    #[serde(default)]
    pub failure_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock build time of the latest attempt, in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub attempt: u32,
}

impl PackageState {
    pub fn new(name: impl Into<PackageName>) -> Self {
        Self {
            name: name.into(),
            status: PackageStatus::Pending,
            failure_type: None,
            failure_message: String::new(),
            log_path: None,
            start_time: None,
            end_time: None,
            duration_ms: 0,
            attempt: 0,
        }
    }

    fn clear_failure(&mut self) {
        self.failure_type = None;
        self.failure_message.clear();
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.end_time = Some(now);
        self.duration_ms = match self.start_time {
            Some(start) => (now - start).num_milliseconds().max(0) as u64,
            None => 0,
        };
    }
}

/// A binary dependency that no requested or archived source provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    pub binary_name: String,
    #[serde(default)]
    pub source_package: Option<PackageName>,
    /// Requesting source packages, in first-seen order, without duplicates.
    #[serde(default)]
    pub required_by: Vec<PackageName>,
    #[serde(default)]
    pub suggested_action: String,
}

/// Run identity shared by fresh and resumed ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHeader {
    pub run_id: String,
    pub target: String,
    pub series: String,
    pub build_type: BuildType,
}

/// Failure and concurrency policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub keep_going: bool,
    /// 0 means unlimited.
    pub max_failures: usize,
    pub parallel: usize,
    /// Whether a SKIPPED dependency satisfies its dependents.
    pub allow_skipped_deps: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            keep_going: true,
            max_failures: 0,
            parallel: 1,
            allow_skipped_deps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub run_id: String,
    pub target: String,
    pub series: String,
    pub build_type: BuildType,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub packages: BTreeMap<PackageName, PackageState>,
    #[serde(default)]
    pub build_order: Vec<PackageName>,
    #[serde(default)]
    pub missing_deps: BTreeMap<String, MissingDependency>,
    #[serde(default)]
    pub cycles: Vec<Vec<PackageName>>,
    #[serde(default)]
    pub total_packages: usize,
    #[serde(default)]
    pub max_failures: usize,
    #[serde(default = "default_true")]
    pub keep_going: bool,
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    #[serde(default)]
    pub allow_skipped_deps: bool,
}

fn default_true() -> bool {
    true
}

fn default_parallel() -> usize {
    1
}

impl Ledger {
    /// Fresh ledger with every package of `build_order` PENDING.
    pub fn new(header: RunHeader, policy: RunPolicy, build_order: Vec<PackageName>) -> Self {
        let now = Utc::now();
        let packages = build_order
            .iter()
            .map(|name| (name.clone(), PackageState::new(name.clone())))
            .collect::<BTreeMap<_, _>>();

        let mut ledger = Self {
            run_id: header.run_id,
            target: header.target,
            series: header.series,
            build_type: header.build_type,
            started_at: now,
            updated_at: now,
            completed_at: None,
            total_packages: packages.len(),
            packages,
            build_order,
            missing_deps: BTreeMap::new(),
            cycles: Vec::new(),
            max_failures: 0,
            keep_going: true,
            parallel: 1,
            allow_skipped_deps: false,
        };
        ledger.apply_policy(policy);
        ledger
    }

    pub fn policy(&self) -> RunPolicy {
        RunPolicy {
            keep_going: self.keep_going,
            max_failures: self.max_failures,
            parallel: self.parallel,
            allow_skipped_deps: self.allow_skipped_deps,
        }
    }

    pub fn apply_policy(&mut self, policy: RunPolicy) {
        self.keep_going = policy.keep_going;
        self.max_failures = policy.max_failures;
        self.parallel = policy.parallel.max(1);
        self.allow_skipped_deps = policy.allow_skipped_deps;
    }

    pub fn get(&self, name: &str) -> Option<&PackageState> {
        self.packages.get(name)
    }

    pub fn status_of(&self, name: &str) -> Option<PackageStatus> {
        self.packages.get(name).map(|s| s.status)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    // ---- transitions ----

    /// PENDING -> BUILDING. Bumps `attempt` and records the start time.
    pub fn mark_started(&mut self, name: &str) {
        let now = self.touch();
        if let Some(state) = self.transition(name, PackageStatus::Building) {
            state.attempt += 1;
            state.start_time = Some(now);
            state.end_time = None;
            state.duration_ms = 0;
            state.clear_failure();
            debug!(package = %name, attempt = state.attempt, "package building");
        }
    }

    /// BUILDING -> SUCCESS.
    pub fn mark_success(&mut self, name: &str, log_path: Option<PathBuf>) {
        let now = self.touch();
        if let Some(state) = self.transition(name, PackageStatus::Success) {
            state.finish(now);
            state.log_path = log_path;
            state.clear_failure();
            info!(package = %name, duration_ms = state.duration_ms, "package built");
        }
    }

    /// BUILDING -> FAILED (or PENDING -> FAILED for planning-time failures).
    pub fn mark_failed(
        &mut self,
        name: &str,
        failure_type: FailureType,
        message: impl Into<String>,
        log_path: Option<PathBuf>,
    ) {
        let now = self.touch();
        if let Some(state) = self.transition(name, PackageStatus::Failed) {
            state.finish(now);
            state.failure_type = Some(failure_type);
            state.failure_message = message.into();
            if log_path.is_some() {
                state.log_path = log_path;
            }
            warn!(
                package = %name,
                failure_type = %failure_type,
                message = %state.failure_message,
                "package failed"
            );
        }
    }

    /// PENDING -> SKIPPED (or FAILED -> SKIPPED when resuming).
    pub fn mark_skipped(&mut self, name: &str, reason: impl Into<String>) {
        self.touch();
        if let Some(state) = self.transition(name, PackageStatus::Skipped) {
            state.failure_type = None;
            state.failure_message = reason.into();
            info!(package = %name, reason = %state.failure_message, "package skipped");
        }
    }

    /// PENDING -> BLOCKED.
    pub fn mark_blocked(&mut self, name: &str, blocking_dependency: &str) {
        self.touch();
        if let Some(state) = self.transition(name, PackageStatus::Blocked) {
            state.failure_message = format!("blocked by dependency: {blocking_dependency}");
            info!(package = %name, blocked_by = %blocking_dependency, "package blocked");
        }
    }

    /// Record a missing binary dependency, merging `required_by` with an
    /// existing entry for the same binary.
    pub fn add_missing_dep(&mut self, entry: MissingDependency) {
        self.touch();
        match self.missing_deps.get_mut(&entry.binary_name) {
            Some(existing) => {
                for dependent in entry.required_by {
                    if !existing.required_by.contains(&dependent) {
                        existing.required_by.push(dependent);
                    }
                }
                if existing.source_package.is_none() {
                    existing.source_package = entry.source_package;
                }
                if existing.suggested_action.is_empty() {
                    existing.suggested_action = entry.suggested_action;
                }
            }
            None => {
                let mut entry = entry;
                let mut seen = Vec::with_capacity(entry.required_by.len());
                for dependent in entry.required_by.drain(..) {
                    if !seen.contains(&dependent) {
                        seen.push(dependent);
                    }
                }
                entry.required_by = seen;
                self.missing_deps.insert(entry.binary_name.clone(), entry);
            }
        }
    }

    /// Stamp `completed_at` once nothing is PENDING or BUILDING.
    pub fn mark_completed_if_done(&mut self) {
        if self.is_complete() && self.completed_at.is_none() {
            let now = self.touch();
            self.completed_at = Some(now);
        }
    }

    // ---- queries ----

    pub fn pending(&self) -> Vec<&str> {
        self.with_status(PackageStatus::Pending)
    }

    pub fn building(&self) -> Vec<&str> {
        self.with_status(PackageStatus::Building)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.with_status(PackageStatus::Failed)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.with_status(PackageStatus::Success)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.with_status(PackageStatus::Skipped)
    }

    pub fn blocked(&self) -> Vec<&str> {
        self.with_status(PackageStatus::Blocked)
    }

    /// Package names holding `status`, sorted.
    pub fn with_status(&self, status: PackageStatus) -> Vec<&str> {
        self.packages
            .values()
            .filter(|s| s.status == status)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn count(&self, status: PackageStatus) -> usize {
        self.packages.values().filter(|s| s.status == status).count()
    }

    pub fn failure_count(&self) -> usize {
        self.count(PackageStatus::Failed)
    }

    /// No package is PENDING or BUILDING.
    pub fn is_complete(&self) -> bool {
        self.packages.values().all(|s| s.status.is_terminal())
    }

    /// Whether the failure policy forbids further dispatches.
    pub fn should_stop(&self) -> bool {
        let failed = self.failure_count();
        (!self.keep_going && failed >= 1) || (self.max_failures > 0 && failed >= self.max_failures)
    }

    /// Stamp `updated_at` and return the stamp.
    fn touch(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.updated_at = now;
        now
    }

    fn transition(&mut self, name: &str, to: PackageStatus) -> Option<&mut PackageState> {
        let Some(state) = self.packages.get_mut(name) else {
            warn!(package = %name, to = %to, "transition for unknown package; ignoring");
            return None;
        };

        if !transition_allowed(state.status, to) {
            warn!(
                package = %name,
                from = %state.status,
                to = %to,
                "illegal status transition; ignoring"
            );
            return None;
        }

        state.status = to;
        Some(state)
    }
}

/// Transitions accepted by the `mark_*` operations. Resume moves packages
/// back to PENDING directly and does not go through this table.
pub fn transition_allowed(from: PackageStatus, to: PackageStatus) -> bool {
    use PackageStatus::*;
    matches!(
        (from, to),
        (Pending, Building)
            | (Pending, Skipped)
            | (Pending, Blocked)
            | (Pending, Failed)
            | (Building, Success)
            | (Building, Failed)
            | (Failed, Skipped)
    )
}
