// src/plan.rs

//! Planning pass: graph construction plus cycle and missing-dependency
//! detection, reported as data.
//!
//! Nothing here aborts a run. [`PlanReport::check`] turns the findings into
//! an error unless the caller overrides them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dag::{build_dependency_graph, DependencyGraph, ExcludedEdge, SoftDependencyExclusions};
use crate::errors::{Result, StackbuildError};
use crate::index::PackageIndex;
use crate::ledger::MissingDependency;
use crate::types::PackageName;

#[derive(Debug, Clone)]
pub struct PlanReport {
    pub graph: Arc<DependencyGraph>,
    /// Topological order, or `(wave, name)` order when the graph is cyclic.
    pub build_order: Vec<PackageName>,
    pub cycles: Vec<Vec<PackageName>>,
    /// Edges inside cycles; ignored for readiness when cycles are allowed.
    pub cycle_edges: Vec<(PackageName, PackageName)>,
    /// Keyed by binary name.
    pub missing: BTreeMap<String, MissingDependency>,
    /// Requesting package -> unresolvable binaries.
    pub missing_by_dependent: BTreeMap<PackageName, Vec<String>>,
    pub excluded_edges: Vec<ExcludedEdge>,
    pub waves: BTreeMap<PackageName, usize>,
    pub warnings: Vec<String>,
}

/// Build the graph for `requested` and analyse it.
pub fn plan(
    index: &PackageIndex,
    requested: &[PackageName],
    exclusions: &SoftDependencyExclusions,
) -> PlanReport {
    let built = build_dependency_graph(index, requested, exclusions);
    let graph = built.graph;

    let cycles = graph.detect_cycles();
    let build_order = if cycles.is_empty() {
        match graph.get_rebuild_order() {
            Ok(order) => order,
            Err(err) => {
                warn!(error = %err, "ordering failed on an acyclic graph; using waves");
                graph.build_order_with_cycles()
            }
        }
    } else {
        graph.build_order_with_cycles()
    };
    let cycle_edges = if cycles.is_empty() {
        Vec::new()
    } else {
        graph.cycle_edges()
    };

    let known: HashSet<PackageName> = graph
        .package_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let missing_by_dependent = graph.find_missing_dependencies(&known);

    let missing = built
        .unresolved
        .iter()
        .map(|(binary, requesters)| {
            let alternatives: BTreeSet<&str> = requesters
                .values()
                .flatten()
                .map(String::as_str)
                .filter(|alt| *alt != binary.as_str())
                .collect();
            let entry = MissingDependency {
                binary_name: binary.clone(),
                source_package: None,
                required_by: requesters.keys().cloned().collect(),
                suggested_action: suggest_action(binary, &alternatives),
            };
            (binary.clone(), entry)
        })
        .collect::<BTreeMap<_, _>>();

    let waves = graph.compute_waves();

    info!(
        packages = build_order.len(),
        cycles = cycles.len(),
        missing = missing.len(),
        excluded = built.excluded_edges.len(),
        "plan computed"
    );

    PlanReport {
        graph: Arc::new(graph),
        build_order,
        cycles,
        cycle_edges,
        missing,
        missing_by_dependent,
        excluded_edges: built.excluded_edges,
        waves,
        warnings: built.warnings,
    }
}

fn suggest_action(binary: &str, alternatives: &BTreeSet<&str>) -> String {
    if alternatives.is_empty() {
        format!("add the source package that builds '{binary}' to the index or the request")
    } else {
        let alts = alternatives.iter().copied().collect::<Vec<_>>().join(", ");
        format!(
            "add the source package that builds '{binary}' (or one of: {alts}) to the index or the request"
        )
    }
}

impl PlanReport {
    /// Fail on cycles (unless `allow_cycles`) and then on missing
    /// dependencies (unless `allow_missing`).
    pub fn check(&self, allow_cycles: bool, allow_missing: bool) -> Result<()> {
        if !self.cycles.is_empty() {
            if allow_cycles {
                warn!(
                    cycles = self.cycles.len(),
                    ignored_edges = self.cycle_edges.len(),
                    "cycles allowed; edges inside them are ignored"
                );
            } else {
                return Err(StackbuildError::DependencyCycle {
                    cycles: self.cycles.clone(),
                });
            }
        }

        if !self.missing_by_dependent.is_empty() {
            if allow_missing {
                warn!(
                    missing = self.missing.len(),
                    "missing dependencies allowed; proceeding"
                );
            } else {
                for m in self.missing.values() {
                    error!(
                        binary = %m.binary_name,
                        required_by = %m.required_by.join(", "),
                        "missing dependency: {}",
                        m.suggested_action
                    );
                }
                return Err(StackbuildError::MissingDependencies {
                    missing: self.missing_by_dependent.clone(),
                    suggestions: self
                        .missing
                        .iter()
                        .map(|(binary, m)| (binary.clone(), m.suggested_action.clone()))
                        .collect(),
                });
            }
        }

        Ok(())
    }

    /// Packages grouped by wave, each group sorted by name.
    pub fn wave_groups(&self) -> Vec<Vec<PackageName>> {
        let mut groups: Vec<Vec<PackageName>> = Vec::new();
        for (name, &wave) in &self.waves {
            if groups.len() <= wave {
                groups.resize_with(wave + 1, Vec::new);
            }
            groups[wave].push(name.clone());
        }
        groups
    }
}
