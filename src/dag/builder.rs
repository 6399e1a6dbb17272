// src/dag/builder.rs

//! Reduce binary-level metadata from the [`PackageIndex`] to source-level
//! edges between requested packages.
//!
//! For every relation of every binary of a requested source, the first
//! alternative that resolves to a source package decides the outcome:
//!
//! - owned by the same source: ignored (self edge)
//! - owned by another requested source: edge, unless soft-excluded
//! - owned by a source outside the request: already in the archive, no edge
//! - nothing resolves: dangling edge to the first alternative's binary
//!   name, kept apart from source nodes, which later surfaces as a missing
//!   dependency

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::exclusions::SoftDependencyExclusions;
use crate::dag::graph::DependencyGraph;
use crate::index::{PackageIndex, Relation};
use crate::types::PackageName;

/// A source-level edge dropped because of the exclusion table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExcludedEdge {
    pub dependent: PackageName,
    pub dependency: PackageName,
}

#[derive(Debug, Clone, Default)]
pub struct GraphBuildResult {
    pub graph: DependencyGraph,
    pub excluded_edges: Vec<ExcludedEdge>,
    /// Unresolvable binary -> requesting source -> alternatives tried.
    pub unresolved: BTreeMap<String, BTreeMap<PackageName, Vec<String>>>,
    pub warnings: Vec<String>,
}

/// Build the dependency graph for `requested` sources.
pub fn build_dependency_graph(
    index: &PackageIndex,
    requested: &[PackageName],
    exclusions: &SoftDependencyExclusions,
) -> GraphBuildResult {
    let mut result = GraphBuildResult::default();
    let requested_set: HashSet<&str> = requested.iter().map(String::as_str).collect();

    for source in requested {
        let version = match index.source(source) {
            Some(src) => src.version.clone(),
            None => {
                let msg = format!("requested package '{source}' is not in the package index");
                warn!(package = %source, "{msg}");
                result.warnings.push(msg);
                String::new()
            }
        };
        result.graph.add_node(source.clone(), true, version);
    }

    for source in requested {
        for binary in index.binaries_for_source(source) {
            for relation in binary.all_relations() {
                add_relation(
                    &mut result,
                    index,
                    &requested_set,
                    exclusions,
                    source,
                    relation,
                );
            }
        }
    }

    debug!(
        nodes = result.graph.len(),
        edges = result.graph.edges().len(),
        excluded = result.excluded_edges.len(),
        "dependency graph built"
    );

    result
}

fn add_relation(
    result: &mut GraphBuildResult,
    index: &PackageIndex,
    requested: &HashSet<&str>,
    exclusions: &SoftDependencyExclusions,
    source: &str,
    relation: &Relation,
) {
    if relation.names().any(|n| exclusions.is_optional_binary(n)) {
        debug!(
            package = %source,
            relation = ?relation.names().collect::<Vec<_>>(),
            "optional binary; not adding an edge"
        );
        return;
    }

    let resolved = relation.names().find_map(|n| index.resolve_source(n));

    match resolved {
        Some(dep) if dep == source => {}
        Some(dep) if requested.contains(dep) => {
            if exclusions.is_excluded(source, dep) {
                info!(
                    package = %source,
                    dependency = %dep,
                    "skipping soft dependency edge"
                );
                let edge = ExcludedEdge {
                    dependent: source.to_string(),
                    dependency: dep.to_string(),
                };
                if !result.excluded_edges.contains(&edge) {
                    result.excluded_edges.push(edge);
                }
            } else {
                result.graph.add_edge(source, dep);
            }
        }
        Some(_) => {
            // Provided by a source outside this request.
        }
        None => {
            let alternatives: Vec<String> = relation.names().map(str::to_string).collect();
            let Some(first) = alternatives.first().cloned() else {
                return;
            };
            debug!(package = %source, binary = %first, "unresolvable dependency");
            result.graph.add_dangling_edge(source, &first);
            result
                .unresolved
                .entry(first)
                .or_default()
                .insert(source.to_string(), alternatives);
        }
    }
}
