//! Property tests for topological sorting and cycle detection.

use girder::graph::{detect_cycles, topological_sort};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Random DAG: edges only go from a lower to a higher index.
fn dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..24).prop_flat_map(|n| {
        let edge = (0..n, 0..n).prop_filter_map("forward edge", |(a, b)| {
            (a != b).then(|| (a.min(b), a.max(b)))
        });
        (Just(n), prop::collection::vec(edge, 0..60))
    })
}

/// Random digraph, self-loops included.
fn digraph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..16).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..40)))
}

fn successors(edges: &[(usize, usize)]) -> BTreeMap<usize, Vec<usize>> {
    let mut map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &(a, b) in edges {
        map.entry(a).or_default().push(b);
    }
    map
}

fn reachable(adjacency: &BTreeMap<usize, Vec<usize>>, from: usize, to: usize) -> bool {
    let mut stack = vec![from];
    let mut seen = BTreeSet::new();
    while let Some(node) = stack.pop() {
        for &next in adjacency.get(&node).into_iter().flatten() {
            if next == to {
                return true;
            }
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    false
}

proptest! {
    #[test]
    fn sorted_dag_respects_every_edge((n, edges) in dag()) {
        // Shuffle the node order so ties are not trivially sorted.
        let nodes: Vec<usize> = (0..n).rev().collect();

        let order = topological_sort(&nodes, &edges).unwrap();

        prop_assert_eq!(order.len(), n);
        let position: BTreeMap<usize, usize> =
            order.iter().enumerate().map(|(i, &node)| (node, i)).collect();
        for (a, b) in &edges {
            prop_assert!(position[a] < position[b], "edge {} -> {} violated", a, b);
        }
    }

    #[test]
    fn sort_is_deterministic((n, edges) in dag()) {
        let nodes: Vec<usize> = (0..n).collect();
        prop_assert_eq!(
            topological_sort(&nodes, &edges).unwrap(),
            topological_sort(&nodes, &edges).unwrap()
        );
    }

    #[test]
    fn back_edge_makes_sort_fail((n, mut edges) in dag()) {
        // Close a cycle through a forward chain 0 -> 1 -> ... -> n-1 -> 0.
        edges.extend((0..n - 1).map(|i| (i, i + 1)));
        edges.push((n - 1, 0));
        let nodes: Vec<usize> = (0..n).collect();

        let err = topological_sort(&nodes, &edges).unwrap_err();

        let cycle = err.cycle.expect("a cycle is reported");
        prop_assert!(!cycle.is_empty());
    }

    #[test]
    fn cycle_members_are_pairwise_reachable((n, edges) in digraph()) {
        let adjacency = successors(&edges);

        let cycles = detect_cycles(0..n, |node| adjacency.get(node).cloned().unwrap_or_default());

        for cycle in &cycles {
            for &a in cycle.members() {
                for &b in cycle.members() {
                    prop_assert!(reachable(&adjacency, a, b), "{} cannot reach {}", a, b);
                }
            }
        }
        let has_cycle = (0..n).any(|node| reachable(&adjacency, node, node));
        prop_assert_eq!(!cycles.is_empty(), has_cycle);
    }
}
