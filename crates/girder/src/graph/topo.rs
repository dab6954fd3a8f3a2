//! Kahn's algorithm with deterministic tie-breaking.

use super::cycles::{Cycle, detect_cycles};
use crate::error::Error;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// Failure of [`topological_sort`]: some nodes lie on or behind a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<N> {
    /// Nodes that could not be ordered, in input order
    pub unresolved: Vec<N>,

    /// A cycle among the unresolved nodes
    pub cycle: Option<Cycle<N>>,
}

impl<N: fmt::Display> fmt::Display for CycleError<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cycle {
            Some(cycle) => write!(f, "cycle detected: {cycle}"),
            None => write!(f, "{} node(s) could not be ordered", self.unresolved.len()),
        }
    }
}

impl<N: fmt::Debug + fmt::Display> std::error::Error for CycleError<N> {}

impl<N: fmt::Display> From<CycleError<N>> for Error {
    fn from(err: CycleError<N>) -> Self {
        let path = match err.cycle {
            Some(cycle) => cycle.path_labels(),
            None => err.unresolved.iter().map(ToString::to_string).collect(),
        };
        Error::Cycle { path }
    }
}

/// Order `nodes` so that every edge `(u, v)` has `u` before `v`.
///
/// Nodes that become ready at the same time keep their input order, so the
/// result is reproducible. Duplicate nodes are collapsed and edges naming
/// an unknown node are ignored.
///
/// # Errors
///
/// Returns a [`CycleError`] carrying the unresolved nodes and one full
/// cycle among them when the edges are not acyclic.
pub fn topological_sort<N>(nodes: &[N], edges: &[(N, N)]) -> Result<Vec<N>, CycleError<N>>
where
    N: Clone + Ord + Hash,
{
    let mut index: HashMap<&N, usize> = HashMap::with_capacity(nodes.len());
    let mut unique: Vec<&N> = Vec::with_capacity(nodes.len());
    for node in nodes {
        index.entry(node).or_insert_with(|| {
            unique.push(node);
            unique.len() - 1
        });
    }

    let count = unique.len();
    let mut in_degree = vec![0_usize; count];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (from, to) in edges {
        let (Some(&from), Some(&to)) = (index.get(from), index.get(to)) else {
            continue;
        };
        adjacency[from].push(to);
        in_degree[to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(current) = queue.pop_front() {
        order.push(current);
        for &next in &adjacency[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() == count {
        return Ok(order.into_iter().map(|i| unique[i].clone()).collect());
    }

    let stuck: Vec<usize> = (0..count).filter(|&i| in_degree[i] > 0).collect();
    let cycle = detect_cycles(stuck.iter().copied(), |&i| {
        adjacency[i]
            .iter()
            .copied()
            .filter(|&next| in_degree[next] > 0)
            .collect::<Vec<_>>()
    })
    .into_iter()
    .next()
    .map(|cycle| cycle.map(|i| unique[i].clone()));

    Err(CycleError {
        unresolved: stuck.into_iter().map(|i| unique[i].clone()).collect(),
        cycle,
    })
}
