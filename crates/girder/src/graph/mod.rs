//! Graph algorithms and the petgraph view of a node map.
//!
//! ## Edge Direction Convention
//!
//! [`IssueGraph`] stores both relation kinds in one `DiGraph`:
//!
//! - **Tracking**: parent -> child
//! - **Blocking**: blocker -> blocked (if A is blocked by B, the edge is `B -> A`)
//!
//! The generic [`detect_cycles`] and [`topological_sort`] work on any node
//! type and never see item text.

pub mod cycles;
pub mod topo;

pub use cycles::{Cycle, detect_cycles};
pub use topo::{CycleError, topological_sort};

use crate::domain::{ItemNumber, NodeMap};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Relation carried by an edge of an [`IssueGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Structural parent -> child
    Tracking,

    /// Blocker -> blocked
    Blocking,
}

/// Both relation kinds of one node map as a directed graph.
#[derive(Debug, Clone, Default)]
pub struct IssueGraph {
    graph: DiGraph<ItemNumber, EdgeKind>,
    index: HashMap<ItemNumber, NodeIndex>,
}

impl IssueGraph {
    /// Build the graph from a map's tracking edges plus `(blocker, blocked)`
    /// pairs.
    ///
    /// Blocking pairs naming items outside the map are skipped.
    pub fn new(map: &NodeMap, blocking: &[(ItemNumber, ItemNumber)]) -> Self {
        let mut graph = Self::default();
        for item in map.items() {
            graph.node(item.number);
        }

        for item in map.items() {
            for &child in &item.children {
                if map.contains(child) {
                    graph.add_edge(item.number, child, EdgeKind::Tracking);
                }
            }
        }

        for &(blocker, blocked) in blocking {
            if map.contains(blocker) && map.contains(blocked) {
                graph.add_edge(blocker, blocked, EdgeKind::Blocking);
            }
        }

        graph
    }

    fn node(&mut self, number: ItemNumber) -> NodeIndex {
        *self
            .index
            .entry(number)
            .or_insert_with(|| self.graph.add_node(number))
    }

    /// Add an edge unless an identical one exists.
    pub fn add_edge(&mut self, from: ItemNumber, to: ItemNumber, kind: EdgeKind) {
        let from = self.node(from);
        let to = self.node(to);
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|edge| *edge.weight() == kind);
        if !exists {
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Number of items in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges of `kind`.
    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.graph
            .edge_references()
            .filter(|edge| *edge.weight() == kind)
            .count()
    }

    /// Targets of `kind` edges leaving `number`, ascending.
    pub fn successors(&self, number: ItemNumber, kind: EdgeKind) -> Vec<ItemNumber> {
        let Some(&idx) = self.index.get(&number) else {
            return Vec::new();
        };
        let mut out: Vec<ItemNumber> = self
            .graph
            .edges(idx)
            .filter(|edge| *edge.weight() == kind)
            .map(|edge| self.graph[edge.target()])
            .collect();
        out.sort_unstable();
        out
    }

    fn cycles(&self, kind: EdgeKind) -> Vec<Cycle<ItemNumber>> {
        let mut numbers: Vec<ItemNumber> = self.index.keys().copied().collect();
        numbers.sort_unstable();
        detect_cycles(numbers, |&n| self.successors(n, kind))
    }

    /// Cycles over blocking edges.
    pub fn blocking_cycles(&self) -> Vec<Cycle<ItemNumber>> {
        self.cycles(EdgeKind::Blocking)
    }

    /// Cycles over tracking edges.
    pub fn tracking_cycles(&self) -> Vec<Cycle<ItemNumber>> {
        self.cycles(EdgeKind::Tracking)
    }
}
