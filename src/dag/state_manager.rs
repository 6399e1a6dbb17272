// src/dag/state_manager.rs

//! Ledger state transitions driven by the scheduler.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::dag::graph::DependencyGraph;
use crate::dag::job::BuildJob;
use crate::ledger::Ledger;
use crate::types::{FailureType, PackageName, PackageStatus};

/// Whether a PENDING package can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Some dependency is still PENDING or BUILDING.
    Waiting,
    /// This dependency can never succeed in this run.
    Blocked(PackageName),
}

/// Edges the scheduler does not wait on, as `(dependent, dependency)`.
pub type IgnoredEdges = HashSet<(PackageName, PackageName)>;

/// Applies scheduling decisions to a borrowed ledger.
pub struct StateManager<'a> {
    graph: &'a DependencyGraph,
    ledger: &'a mut Ledger,
    ignored: &'a IgnoredEdges,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        ledger: &'a mut Ledger,
        ignored: &'a IgnoredEdges,
    ) -> Self {
        Self {
            graph,
            ledger,
            ignored,
        }
    }

    fn view(&self) -> ReadOnlyStateManager<'_> {
        ReadOnlyStateManager::new(self.graph, &*self.ledger, self.ignored)
    }

    /// Mark every PENDING package with an unsatisfiable dependency BLOCKED,
    /// repeating until nothing changes so blocking flows down chains.
    pub fn propagate_blocked(&mut self) -> Vec<PackageName> {
        let mut newly_blocked = Vec::new();

        loop {
            let decisions: Vec<(PackageName, PackageName)> = {
                let view = self.view();
                view.pending_in_order()
                    .into_iter()
                    .filter_map(|name| match view.readiness(&name) {
                        Readiness::Blocked(dep) => Some((name, dep)),
                        Readiness::Ready | Readiness::Waiting => None,
                    })
                    .collect()
            };

            if decisions.is_empty() {
                break;
            }

            for (name, dep) in decisions {
                self.ledger.mark_blocked(&name, &dep);
                newly_blocked.push(name);
            }
        }

        newly_blocked
    }

    /// Mark up to `capacity` ready packages BUILDING, in build order, and
    /// return them as jobs.
    pub fn collect_ready(&mut self, capacity: usize) -> Vec<BuildJob> {
        if capacity == 0 {
            return Vec::new();
        }

        // Decide first, then mutate.
        let ready: Vec<PackageName> = {
            let view = self.view();
            view.pending_in_order()
                .into_iter()
                .filter(|name| view.readiness(name) == Readiness::Ready)
                .take(capacity)
                .collect()
        };

        let mut jobs = Vec::with_capacity(ready.len());
        for name in ready {
            self.ledger.mark_started(&name);
            let attempt = self.ledger.get(&name).map(|s| s.attempt).unwrap_or(1);
            let version = self
                .graph
                .node(&name)
                .map(|n| n.version)
                .unwrap_or_default();

            if attempt > 1 {
                info!(package = %name, attempt, "dispatching package for another attempt");
            } else {
                info!(package = %name, "dispatching package");
            }

            jobs.push(BuildJob {
                package: name,
                version,
                attempt,
                run_id: self.ledger.run_id.clone(),
            });
        }

        jobs
    }

    /// Nothing is in flight and nothing is ready, yet packages are still
    /// PENDING: they wait on each other through a cycle that was let
    /// through. Fail them so the run terminates.
    pub fn fail_stalled(&mut self) -> Vec<PackageName> {
        let stalled: Vec<(PackageName, Vec<PackageName>)> = {
            let view = self.view();
            view.pending_in_order()
                .into_iter()
                .map(|name| {
                    let waiting_on = view.unfinished_dependencies(&name);
                    (name, waiting_on)
                })
                .collect()
        };

        let mut failed = Vec::with_capacity(stalled.len());
        for (name, waiting_on) in stalled {
            debug!(package = %name, ?waiting_on, "stalled package");
            self.ledger.mark_failed(
                &name,
                FailureType::Cycle,
                format!("cannot make progress; waiting on {}", waiting_on.join(", ")),
                None,
            );
            failed.push(name);
        }
        failed
    }
}

/// A read-only view for readiness checks.
///
/// Dependencies outside the ledger (not part of this run) and ignored edges
/// never hold a package back.
pub struct ReadOnlyStateManager<'a> {
    graph: &'a DependencyGraph,
    ledger: &'a Ledger,
    ignored: &'a IgnoredEdges,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(graph: &'a DependencyGraph, ledger: &'a Ledger, ignored: &'a IgnoredEdges) -> Self {
        Self {
            graph,
            ledger,
            ignored,
        }
    }

    pub fn readiness(&self, name: &str) -> Readiness {
        let mut waiting = false;

        for dep in self.in_scope_dependencies(name) {
            match self.ledger.status_of(dep) {
                Some(PackageStatus::Success) => {}
                Some(PackageStatus::Skipped) if self.ledger.allow_skipped_deps => {}
                Some(PackageStatus::Skipped)
                | Some(PackageStatus::Failed)
                | Some(PackageStatus::Blocked) => return Readiness::Blocked(dep.to_string()),
                Some(PackageStatus::Pending) | Some(PackageStatus::Building) => waiting = true,
                None => {}
            }
        }

        if waiting {
            Readiness::Waiting
        } else {
            Readiness::Ready
        }
    }

    /// PENDING packages in build order, then any stragglers by name.
    pub fn pending_in_order(&self) -> Vec<PackageName> {
        let mut out: Vec<PackageName> = self
            .ledger
            .build_order
            .iter()
            .filter(|n| self.ledger.status_of(n) == Some(PackageStatus::Pending))
            .cloned()
            .collect();
        for name in self.ledger.pending() {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
        out
    }

    fn unfinished_dependencies(&self, name: &str) -> Vec<PackageName> {
        self.in_scope_dependencies(name)
            .filter(|dep| {
                matches!(
                    self.ledger.status_of(dep),
                    Some(PackageStatus::Pending) | Some(PackageStatus::Building)
                )
            })
            .map(str::to_string)
            .collect()
    }

    fn in_scope_dependencies<'b>(&'b self, name: &'b str) -> impl Iterator<Item = &'b str> + 'b {
        self.graph.dependencies_of(name).into_iter().filter(move |dep| {
            self.ledger.contains(dep)
                && !self.ignored.contains(&(name.to_string(), dep.to_string()))
        })
    }
}
