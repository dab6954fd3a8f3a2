//! Cycle detection over any directed graph given as a successor function.
//!
//! The search is a depth-first walk that keeps a global `done` set and the
//! current path (with an index from node to path position). Meeting a node
//! that is already on the path closes a cycle: the path suffix starting at
//! that node. Each cycle is reported once, rotated to start at its smallest
//! member.

#![allow(clippy::module_name_repetitions)]

use crate::error::Error;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// A directed cycle, stored without repeating its first member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle<N> {
    members: Vec<N>,
}

impl<N: Ord> Cycle<N> {
    /// Create a cycle from its members in edge order, rotated to start at
    /// the smallest one.
    pub fn new(mut members: Vec<N>) -> Self {
        if let Some(start) = members
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
        {
            members.rotate_left(start);
        }
        Self { members }
    }
}

impl<N> Cycle<N> {
    /// Members in edge order, starting at the smallest.
    pub fn members(&self) -> &[N] {
        &self.members
    }

    /// Number of distinct members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` for a cycle without members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Convert member values, re-canonicalizing the rotation.
    pub fn map<M: Ord>(self, f: impl FnMut(N) -> M) -> Cycle<M> {
        Cycle::new(self.members.into_iter().map(f).collect())
    }
}

impl<N: fmt::Display> Cycle<N> {
    /// Members as text with the first one repeated at the end.
    pub fn path_labels(&self) -> Vec<String> {
        self.members
            .iter()
            .chain(self.members.first())
            .map(ToString::to_string)
            .collect()
    }

    /// The cycle as `a -> b -> c -> a`.
    pub fn path(&self) -> String {
        self.path_labels().join(" -> ")
    }
}

impl<N: fmt::Display> fmt::Display for Cycle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl<N: fmt::Display> From<Cycle<N>> for Error {
    fn from(cycle: Cycle<N>) -> Self {
        Error::Cycle {
            path: cycle.path_labels(),
        }
    }
}

struct Search<N> {
    done: HashSet<N>,
    path: Vec<N>,
    on_path: HashMap<N, usize>,
    seen: HashSet<Vec<N>>,
    cycles: Vec<Cycle<N>>,
}

impl<N: Clone + Ord + Hash> Search<N> {
    fn record(&mut self, start: usize) {
        let members = self.path[start..].to_vec();
        let mut key = members.clone();
        key.sort();
        if self.seen.insert(key) {
            self.cycles.push(Cycle::new(members));
        }
    }
}

fn visit<N, F, S>(node: &N, successors: &mut F, search: &mut Search<N>)
where
    N: Clone + Ord + Hash,
    F: FnMut(&N) -> S,
    S: IntoIterator<Item = N>,
{
    search.on_path.insert(node.clone(), search.path.len());
    search.path.push(node.clone());

    let next: Vec<N> = successors(node).into_iter().collect();
    for successor in next {
        if let Some(&start) = search.on_path.get(&successor) {
            search.record(start);
        } else if !search.done.contains(&successor) {
            visit(&successor, successors, search);
        }
    }

    search.path.pop();
    search.on_path.remove(node);
    search.done.insert(node.clone());
}

/// Find cycles reachable from `nodes` through `successors`.
///
/// Starting points are tried in the order given. Every graph with a cycle
/// yields at least one; cycles sharing members with one already found may
/// not all be listed. A self-loop is a one-member cycle.
pub fn detect_cycles<N, I, F, S>(nodes: I, mut successors: F) -> Vec<Cycle<N>>
where
    N: Clone + Ord + Hash,
    I: IntoIterator<Item = N>,
    F: FnMut(&N) -> S,
    S: IntoIterator<Item = N>,
{
    let mut search = Search {
        done: HashSet::new(),
        path: Vec::new(),
        on_path: HashMap::new(),
        seen: HashSet::new(),
        cycles: Vec::new(),
    };

    for node in nodes {
        if !search.done.contains(&node) {
            visit(&node, &mut successors, &mut search);
        }
    }

    search.cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn adjacency(edges: &[(u32, u32)]) -> BTreeMap<u32, Vec<u32>> {
        let mut adj: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for &(from, to) in edges {
            adj.entry(from).or_default().push(to);
            adj.entry(to).or_default();
        }
        adj
    }

    fn cycles_of(edges: &[(u32, u32)]) -> Vec<Cycle<u32>> {
        let adj = adjacency(edges);
        detect_cycles(adj.keys().copied(), |n| adj[n].clone())
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        assert!(cycles_of(&[(1, 2), (2, 3), (1, 3)]).is_empty());
    }

    #[test]
    fn test_triangle_is_reported_once_from_smallest_member() {
        let cycles = cycles_of(&[(3, 1), (1, 2), (2, 3)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members(), &[1, 2, 3]);
        assert_eq!(cycles[0].path(), "1 -> 2 -> 3 -> 1");
    }

    #[test]
    fn test_self_loop() {
        let cycles = cycles_of(&[(7, 7)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path(), "7 -> 7");
    }

    #[test]
    fn test_disjoint_cycles_are_both_found() {
        let cycles = cycles_of(&[(1, 2), (2, 1), (5, 6), (6, 5), (2, 5)]);
        let paths: Vec<String> = cycles.iter().map(Cycle::path).collect();
        assert_eq!(paths, vec!["1 -> 2 -> 1", "5 -> 6 -> 5"]);
    }

    #[test]
    fn test_cycle_converts_to_error_with_full_path() {
        let err: Error = Cycle::new(vec!["t1", "e1"]).into();
        assert_eq!(err.to_string(), "Cycle detected: e1 -> t1 -> e1");
    }
}
