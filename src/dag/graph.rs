// src/dag/graph.rs

//! Dependency graph over source package names.
//!
//! Nodes live in a dense arena: every name seen by [`DependencyGraph::add_node`]
//! or [`DependencyGraph::add_edge`] gets an integer id, and adjacency is kept
//! as id lists sorted by name. A name that only appears as an edge target is
//! *referenced* but not a node; such dangling targets are what
//! [`DependencyGraph::find_missing_dependencies`] reports.
//!
//! Binaries that resolve to no source at all are recorded separately with
//! [`DependencyGraph::add_dangling_edge`]. They never share the node key
//! space, so a binary named like a requested source cannot turn into a
//! real edge.
//!
//! Edge direction: `add_edge(from, to)` means `from` needs `to` built first.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::errors::{Result, StackbuildError};
use crate::types::PackageName;

/// Public view of a node's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub name: PackageName,
    pub needs_rebuild: bool,
    pub version: String,
}

#[derive(Debug, Clone)]
struct NodeAttrs {
    needs_rebuild: bool,
    version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed graph of "must build before" relationships.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<PackageName>,
    index: HashMap<PackageName, usize>,
    /// `None` for names that are only referenced by an edge.
    attrs: Vec<Option<NodeAttrs>>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    /// Unresolvable binary names per id, sorted.
    dangling: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a package node. Re-adding an existing name overwrites its
    /// attributes (last write wins); edges are kept.
    pub fn add_node(
        &mut self,
        name: impl Into<PackageName>,
        needs_rebuild: bool,
        version: impl Into<String>,
    ) {
        let id = self.intern(name.into());
        let version = version.into();
        if let Some(prev) = &self.attrs[id] {
            debug!(
                package = %self.names[id],
                old_version = %prev.version,
                new_version = %version,
                "re-adding node; overwriting attributes"
            );
        }
        self.attrs[id] = Some(NodeAttrs {
            needs_rebuild,
            version,
        });
    }

    /// Record that `from` requires `to` to be built first. `to` does not have
    /// to be a node (yet). Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from_id = self.intern(from.to_string());
        let to_id = self.intern(to.to_string());

        if self.deps[from_id].contains(&to_id) {
            return;
        }
        insert_sorted(&self.names, &mut self.deps[from_id], to_id);
        insert_sorted(&self.names, &mut self.dependents[to_id], from_id);
    }

    /// Record that `from` needs the binary `binary`, which no source
    /// package provides. Nothing is interned for `binary`.
    pub fn add_dangling_edge(&mut self, from: &str, binary: &str) {
        let from_id = self.intern(from.to_string());
        let list = &mut self.dangling[from_id];
        if let Err(pos) = list.binary_search_by(|b| b.as_str().cmp(binary)) {
            list.insert(pos, binary.to_string());
        }
    }

    /// Unresolvable binaries recorded for `name`, sorted.
    pub fn dangling_of(&self, name: &str) -> &[String] {
        match self.index.get(name) {
            Some(&id) => &self.dangling[id],
            None => &[],
        }
    }

    /// Whether `name` was added as a node (not merely referenced).
    pub fn contains(&self, name: &str) -> bool {
        self.node_id(name).is_some()
    }

    pub fn node(&self, name: &str) -> Option<PackageNode> {
        let id = self.node_id(name)?;
        let attrs = self.attrs[id].as_ref()?;
        Some(PackageNode {
            name: self.names[id].clone(),
            needs_rebuild: attrs.needs_rebuild,
            version: attrs.version.clone(),
        })
    }

    /// Number of real nodes.
    pub fn len(&self) -> usize {
        self.attrs.iter().filter(|a| a.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all real nodes, sorted.
    pub fn package_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .node_ids()
            .map(|id| self.names[id].as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// Direct dependencies of `name`, sorted. Includes edge targets that are
    /// not nodes, but not binaries from [`Self::add_dangling_edge`].
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        match self.index.get(name) {
            Some(&id) => self.deps[id].iter().map(|&d| self.names[d].as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Direct dependents of `name`, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        match self.index.get(name) {
            Some(&id) => self
                .dependents[id]
                .iter()
                .map(|&d| self.names[d].as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// All edges as `(dependent, dependency)` pairs, sorted.
    pub fn edges(&self) -> Vec<(PackageName, PackageName)> {
        let mut ids: Vec<usize> = (0..self.names.len()).collect();
        ids.sort_by(|a, b| self.names[*a].cmp(&self.names[*b]));

        let mut out = Vec::new();
        for from in ids {
            for &to in &self.deps[from] {
                out.push((self.names[from].clone(), self.names[to].clone()));
            }
        }
        out
    }

    /// Find cycles with a three-colour depth-first search.
    ///
    /// Roots and neighbours are visited in lexicographic order. Every back
    /// edge to an in-progress node yields one cycle, unwound from the DFS
    /// path starting at the back-edge target, with that target repeated at
    /// the end (e.g. `["a", "b", "a"]`).
    pub fn detect_cycles(&self) -> Vec<Vec<PackageName>> {
        let n = self.names.len();
        let mut color = vec![Color::White; n];
        let mut cycles = Vec::new();

        let mut roots: Vec<usize> = (0..n).collect();
        roots.sort_by(|a, b| self.names[*a].cmp(&self.names[*b]));

        for root in roots {
            if color[root] != Color::White {
                continue;
            }

            // The stack doubles as the current DFS path: (node, next child).
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            color[root] = Color::Gray;

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                if let Some(&child) = self.deps[node].get(next) {
                    top.1 += 1;
                    match color[child] {
                        Color::White => {
                            color[child] = Color::Gray;
                            stack.push((child, 0));
                        }
                        Color::Gray => {
                            let start = stack
                                .iter()
                                .position(|&(id, _)| id == child)
                                .unwrap_or(0);
                            let mut cycle: Vec<PackageName> = stack[start..]
                                .iter()
                                .map(|&(id, _)| self.names[id].clone())
                                .collect();
                            cycle.push(self.names[child].clone());
                            debug!(cycle = ?cycle, "back edge found");
                            cycles.push(cycle);
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }

        cycles
    }

    /// Topological build order (dependencies first) restricted to nodes
    /// flagged `needs_rebuild` plus their transitive dependencies.
    ///
    /// Kahn's algorithm over the whole graph, with simultaneously-ready nodes
    /// taken in lexicographic order. Any cycle in the graph makes this fail
    /// with [`StackbuildError::DependencyCycle`] carrying the cycles found by
    /// [`Self::detect_cycles`]. Dangling targets never appear in the order.
    pub fn get_rebuild_order(&self) -> Result<Vec<PackageName>> {
        let n = self.names.len();
        let mut remaining: Vec<usize> = self.deps.iter().map(|d| d.len()).collect();
        let mut ready: BinaryHeap<Reverse<(&str, usize)>> = (0..n)
            .filter(|&id| remaining[id] == 0)
            .map(|id| Reverse((self.names[id].as_str(), id)))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            for &dependent in &self.dependents[id] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse((self.names[dependent].as_str(), dependent)));
                }
            }
        }

        if order.len() < n {
            return Err(StackbuildError::DependencyCycle {
                cycles: self.detect_cycles(),
            });
        }

        let wanted = self.rebuild_closure();
        Ok(order
            .into_iter()
            .filter(|id| wanted.contains(id))
            .map(|id| self.names[id].clone())
            .collect())
    }

    /// For every edge whose target is not in `known_packages`, group the
    /// target under its requesting package. Dangling binaries are always
    /// reported, whatever `known_packages` holds.
    pub fn find_missing_dependencies(
        &self,
        known_packages: &HashSet<PackageName>,
    ) -> BTreeMap<PackageName, Vec<PackageName>> {
        let mut missing: BTreeMap<PackageName, Vec<PackageName>> = BTreeMap::new();
        for (from, to) in self.edges() {
            if !known_packages.contains(&to) {
                let entry = missing.entry(from).or_default();
                if !entry.contains(&to) {
                    entry.push(to);
                }
            }
        }
        for (id, binaries) in self.dangling.iter().enumerate() {
            if binaries.is_empty() {
                continue;
            }
            let entry = missing.entry(self.names[id].clone()).or_default();
            for binary in binaries {
                if !entry.contains(binary) {
                    entry.push(binary.clone());
                }
            }
            entry.sort();
        }
        missing
    }

    /// Wave number per node: 0 when a node has no in-graph dependencies,
    /// otherwise one more than the highest wave among its dependencies.
    ///
    /// Strongly connected components are collapsed first, so this also works
    /// on cyclic graphs: all members of a cycle share a wave.
    pub fn compute_waves(&self) -> BTreeMap<PackageName, usize> {
        let (graph, ids) = self.node_graph();
        let sccs = tarjan_scc(&graph);

        let mut component_of: HashMap<NodeIndex, usize> = HashMap::new();
        for (c, members) in sccs.iter().enumerate() {
            for &m in members {
                component_of.insert(m, c);
            }
        }

        // tarjan_scc yields components in reverse topological order of the
        // edge direction; edges point at dependencies, so dependencies come
        // first and their waves are already known.
        let mut component_wave = vec![0usize; sccs.len()];
        for (c, members) in sccs.iter().enumerate() {
            let mut wave = 0;
            for &m in members {
                for dep in graph.neighbors(m) {
                    let dc = component_of[&dep];
                    if dc != c {
                        wave = wave.max(component_wave[dc] + 1);
                    }
                }
            }
            component_wave[c] = wave;
        }

        let mut waves = BTreeMap::new();
        for (idx, &id) in ids.iter().enumerate() {
            let c = component_of[&NodeIndex::new(idx)];
            waves.insert(self.names[id].clone(), component_wave[c]);
        }
        waves
    }

    /// Edges that lie on a cycle (inside one strongly connected component,
    /// or self loops), sorted.
    pub fn cycle_edges(&self) -> Vec<(PackageName, PackageName)> {
        let (graph, ids) = self.node_graph();
        let mut component_of = vec![usize::MAX; ids.len()];
        for (c, members) in tarjan_scc(&graph).iter().enumerate() {
            if members.len() > 1 {
                for m in members {
                    component_of[m.index()] = c;
                }
            }
        }

        let mut out = Vec::new();
        for edge in graph.raw_edges() {
            let (a, b) = (edge.source().index(), edge.target().index());
            if a == b || (component_of[a] != usize::MAX && component_of[a] == component_of[b]) {
                out.push((self.names[ids[a]].clone(), self.names[ids[b]].clone()));
            }
        }
        out.sort();
        out
    }

    /// Order by `(wave, name)`. Used only when cycles were explicitly
    /// allowed, since it cannot honour edges inside a cycle.
    pub fn build_order_with_cycles(&self) -> Vec<PackageName> {
        let mut ordered: Vec<(usize, PackageName)> = self
            .compute_waves()
            .into_iter()
            .map(|(name, wave)| (wave, name))
            .collect();
        ordered.sort();
        ordered.into_iter().map(|(_, name)| name).collect()
    }

    fn intern(&mut self, name: PackageName) -> usize {
        if let Some(&id) = self.index.get(&name) {
            return id;
        }
        let id = self.names.len();
        self.index.insert(name.clone(), id);
        self.names.push(name);
        self.attrs.push(None);
        self.deps.push(Vec::new());
        self.dependents.push(Vec::new());
        self.dangling.push(Vec::new());
        id
    }

    fn node_id(&self, name: &str) -> Option<usize> {
        let &id = self.index.get(name)?;
        self.attrs[id].as_ref().map(|_| id)
    }

    fn node_ids(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.names.len()).filter(|&id| self.attrs[id].is_some())
    }

    /// Real nodes flagged `needs_rebuild` plus every real node reachable
    /// from them through dependency edges.
    fn rebuild_closure(&self) -> HashSet<usize> {
        let mut seen = HashSet::new();
        let mut stack: Vec<usize> = self
            .node_ids()
            .filter(|&id| self.attrs[id].as_ref().is_some_and(|a| a.needs_rebuild))
            .collect();

        while let Some(id) = stack.pop() {
            if self.attrs[id].is_none() || !seen.insert(id) {
                continue;
            }
            stack.extend(self.deps[id].iter().copied());
        }
        seen
    }

    /// petgraph view over real nodes only, with a mapping back to arena ids.
    fn node_graph(&self) -> (DiGraph<(), ()>, Vec<usize>) {
        let ids: Vec<usize> = self.node_ids().collect();
        let mut graph = DiGraph::with_capacity(ids.len(), 0);
        let mut local: HashMap<usize, NodeIndex> = HashMap::new();
        for &id in &ids {
            local.insert(id, graph.add_node(()));
        }
        for &id in &ids {
            for dep in &self.deps[id] {
                if let Some(&to) = local.get(dep) {
                    graph.add_edge(local[&id], to, ());
                }
            }
        }
        (graph, ids)
    }
}

fn insert_sorted(names: &[PackageName], list: &mut Vec<usize>, id: usize) {
    let pos = list
        .binary_search_by(|other| names[*other].cmp(&names[id]))
        .unwrap_or_else(|p| p);
    list.insert(pos, id);
}
