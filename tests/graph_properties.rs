use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use stackbuild::dag::DependencyGraph;

// Acyclic by construction: node N may only depend on nodes 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = DependencyGraph> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_nodes),
            num_nodes,
        )
        .prop_map(move |raw_deps| {
            let mut graph = DependencyGraph::new();
            for i in 0..num_nodes {
                graph.add_node(format!("pkg_{i:02}"), true, "1.0");
            }
            for (i, potential) in raw_deps.into_iter().enumerate() {
                if i == 0 {
                    continue;
                }
                let deps: BTreeSet<usize> = potential.into_iter().map(|d| d % i).collect();
                for d in deps {
                    graph.add_edge(&format!("pkg_{i:02}"), &format!("pkg_{d:02}"));
                }
            }
            graph
        })
    })
}

// Arbitrary edges, cycles included.
fn any_graph_strategy(max_nodes: usize) -> impl Strategy<Value = DependencyGraph> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec((0..num_nodes, 0..num_nodes), 0..(num_nodes * 2)).prop_map(
            move |edges| {
                let mut graph = DependencyGraph::new();
                for i in 0..num_nodes {
                    graph.add_node(format!("n{i}"), true, "");
                }
                for (a, b) in edges {
                    graph.add_edge(&format!("n{a}"), &format!("n{b}"));
                }
                graph
            },
        )
    })
}

proptest! {
    #[test]
    fn dependencies_precede_dependents(graph in dag_strategy(12)) {
        let order = graph.get_rebuild_order().expect("acyclic graph must order");
        prop_assert_eq!(order.len(), graph.len());

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        for (from, to) in graph.edges() {
            prop_assert!(
                position[to.as_str()] < position[from.as_str()],
                "{} must come before {}", to, from
            );
        }
        prop_assert!(graph.detect_cycles().is_empty());
    }

    #[test]
    fn no_cycles_iff_order_succeeds(graph in any_graph_strategy(8)) {
        let cycles = graph.detect_cycles();
        prop_assert_eq!(cycles.is_empty(), graph.get_rebuild_order().is_ok());
        for cycle in &cycles {
            prop_assert!(cycle.len() >= 2);
            prop_assert_eq!(cycle.first(), cycle.last());
        }
    }

    #[test]
    fn waves_respect_acyclic_edges(graph in dag_strategy(12)) {
        let waves = graph.compute_waves();
        for (from, to) in graph.edges() {
            prop_assert!(waves[&to] < waves[&from]);
        }
        prop_assert_eq!(graph.build_order_with_cycles().len(), graph.len());
    }
}
