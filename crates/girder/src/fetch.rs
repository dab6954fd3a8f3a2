//! Graph fetcher: builds a [`NodeMap`] by walking tracking edges from a root.
//!
//! The walk proceeds level by level. Every node at depth `d < max_depth` is
//! expanded through [`IssueTracker::fetch_item`] to learn its children; the
//! expansions of one level run on a bounded pool and their results are
//! applied in item-number order, so the map does not depend on completion
//! order.
//!
//! Nodes at the depth limit are never expanded. They keep the child count the
//! remote reported so they are not mistaken for leaves.

use crate::domain::{IssueRef, ItemNumber, NodeMap, TrackingConflict, WorkItem};
use crate::error::Result;
use crate::tracker::IssueTracker;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;

/// Deepest level the fetcher will retrieve.
pub const MAX_DEPTH: usize = 3;

/// Default number of concurrent expansions.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Traversal limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Levels below the root to retrieve (clamped to `1..=MAX_DEPTH`)
    pub max_depth: usize,

    /// Concurrent expansions per level (at least 1)
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Fetch the tracking hierarchy below `root`.
///
/// # Errors
///
/// Returns the tracker's error when the root itself cannot be fetched.
/// Failures below the root are logged and leave the failed node in the map
/// with whatever child count its parent's listing reported.
pub async fn fetch_graph(
    tracker: &dyn IssueTracker,
    root: &IssueRef,
    options: &FetchOptions,
) -> Result<NodeMap> {
    let max_depth = options.max_depth.clamp(1, MAX_DEPTH);
    let concurrency = options.concurrency.max(1);

    let tracked = tracker.fetch_item(root).await?;

    let mut map = NodeMap::new(root.repo.clone(), root.number);
    let mut visited = BTreeSet::new();

    let mut root_item = tracked.item;
    root_item.depth = 0;
    root_item.parent = None;
    root_item.children.clear();
    visited.insert(root_item.number);
    map.insert(root_item);

    let mut frontier = Vec::new();
    attach_children(
        &mut map,
        &mut visited,
        root.number,
        tracked.children,
        &mut frontier,
    );

    let mut depth = 1;
    while depth < max_depth && !frontier.is_empty() {
        let references: Vec<IssueRef> = frontier.drain(..).map(|n| map.reference(n)).collect();

        let mut results: Vec<(ItemNumber, _)> = stream::iter(references)
            .map(|reference| async move {
                let outcome = tracker.fetch_item(&reference).await;
                (reference.number, outcome)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|(number, _)| *number);

        for (number, outcome) in results {
            match outcome {
                Ok(expanded) => {
                    if let Some(node) = map.nodes.get_mut(&number) {
                        node.child_total = expanded.item.child_total;
                    }
                    attach_children(
                        &mut map,
                        &mut visited,
                        number,
                        expanded.children,
                        &mut frontier,
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        item = %map.reference(number),
                        depth,
                        error = %e,
                        "Failed to expand item, its children are unknown"
                    );
                }
            }
        }

        depth += 1;
    }

    tracing::debug!(
        root = %root,
        nodes = map.len(),
        conflicts = map.conflicts.len(),
        "Fetched graph"
    );
    Ok(map)
}

/// Record `children` under `parent` and queue newly seen ones for expansion.
fn attach_children(
    map: &mut NodeMap,
    visited: &mut BTreeSet<ItemNumber>,
    parent: ItemNumber,
    children: Vec<WorkItem>,
    next: &mut Vec<ItemNumber>,
) {
    let child_depth = map.get(parent).map_or(0, |p| p.depth) + 1;
    let mut listed = Vec::with_capacity(children.len());

    for mut child in children {
        let number = child.number;
        if !listed.contains(&number) {
            listed.push(number);
        }

        if !visited.insert(number) {
            if let Some(first_parent) = map.get(number).and_then(|existing| existing.parent)
                && first_parent != parent
            {
                tracing::warn!(
                    child = number,
                    first_parent,
                    second_parent = parent,
                    "Item tracked under two parents"
                );
                map.conflicts.push(TrackingConflict {
                    child: number,
                    first_parent,
                    second_parent: parent,
                });
            }
            continue;
        }

        child.depth = child_depth;
        child.parent = Some(parent);
        child.children.clear();
        map.insert(child);
        next.push(number);
    }

    if let Some(node) = map.nodes.get_mut(&parent) {
        node.children = listed;
        node.child_total = node.child_total.max(node.children.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepoSlug;
    use crate::tracker::InMemoryTracker;

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    async fn insert(tracker: &InMemoryTracker, number: ItemNumber, children: &[ItemNumber]) {
        let mut item = WorkItem::new(number, format!("Item {number}"));
        item.children = children.to_vec();
        tracker.insert(&repo(), item).await;
    }

    #[tokio::test]
    async fn test_depth_limit_keeps_child_totals() {
        let tracker = InMemoryTracker::new();
        insert(&tracker, 1, &[2]).await;
        insert(&tracker, 2, &[3]).await;
        insert(&tracker, 3, &[]).await;

        let options = FetchOptions {
            max_depth: 1,
            concurrency: 2,
        };
        let map = fetch_graph(&tracker, &IssueRef::new(repo(), 1), &options)
            .await
            .unwrap();

        assert_eq!(map.len(), 2);
        let child = map.get(2).unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent, Some(1));
        assert!(!child.is_leaf());
        assert!(child.children_truncated());
    }

    #[tokio::test]
    async fn test_second_parent_is_recorded_as_conflict() {
        let tracker = InMemoryTracker::new();
        insert(&tracker, 1, &[2, 3]).await;
        insert(&tracker, 2, &[4]).await;
        insert(&tracker, 3, &[4]).await;
        insert(&tracker, 4, &[]).await;

        let map = fetch_graph(&tracker, &IssueRef::new(repo(), 1), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(map.get(4).unwrap().parent, Some(2));
        assert_eq!(
            map.conflicts,
            vec![TrackingConflict {
                child: 4,
                first_parent: 2,
                second_parent: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_depth_is_clamped() {
        let tracker = InMemoryTracker::new();
        insert(&tracker, 1, &[2]).await;
        insert(&tracker, 2, &[]).await;

        let options = FetchOptions {
            max_depth: 0,
            concurrency: 0,
        };
        let map = fetch_graph(&tracker, &IssueRef::new(repo(), 1), &options)
            .await
            .unwrap();

        assert_eq!(map.len(), 2);
    }
}
