//! Structural health of a fetched graph.
//!
//! [`check_health`] never fails on what it finds. Problems that make the
//! graph unusable for scheduling are reported as errors:
//!
//! - blocking cycles and tracking cycles, with their full paths
//! - tracking conflicts (a child listed under two parents)
//!
//! Everything else is advisory:
//!
//! - orphaned items (open under a closed parent)
//! - stale items (open and not updated within the configured window)
//! - childless containers (an Epic or Feature without children)
//! - type-hierarchy violations (a child ranked at or above its parent)
//! - unresolved cross-references (a blocking lookup that failed)
//! - asymmetric edges (an in-map edge recorded on only one endpoint)

use crate::deps::{
    BlockingResolver, DependencySection, WarningKind, local_blocking_edges, parse_section,
};
use crate::domain::{IssueRef, ItemNumber, ItemType, NodeMap};
use crate::graph::{EdgeKind, IssueGraph};
use crate::tracker::IssueTracker;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default inactivity window after which an open item is stale.
pub const DEFAULT_STALE_DAYS: i64 = 30;

/// Health check settings.
#[derive(Debug, Clone, Copy)]
pub struct HealthOptions {
    /// Inactivity window for stale items
    pub stale_after: Duration,

    /// Reference time for staleness
    pub now: DateTime<Utc>,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            stale_after: Duration::days(DEFAULT_STALE_DAYS),
            now: Utc::now(),
        }
    }
}

/// Which list of a section an edge is missing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSide {
    /// The other endpoint's "Blocks" list
    Blocks,

    /// The other endpoint's "Blocked by" list
    BlockedBy,
}

/// One health finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Cycle over blocking edges
    BlockingCycle {
        /// Members with the first repeated at the end
        path: Vec<String>,
    },

    /// Cycle over tracking edges
    TrackingCycle {
        /// Members with the first repeated at the end
        path: Vec<String>,
    },

    /// Child listed under two parents
    TrackingConflict {
        /// The child
        child: ItemNumber,
        /// Parent it was first seen under
        first_parent: ItemNumber,
        /// Parent that listed it again
        second_parent: ItemNumber,
    },

    /// Open item under a closed parent
    Orphaned {
        /// The open item
        item: ItemNumber,
        /// Its closed parent
        parent: ItemNumber,
    },

    /// Open item not updated within the window
    Stale {
        /// The item
        item: ItemNumber,
        /// Days since the last update
        days_inactive: i64,
    },

    /// Container type without children
    ChildlessContainer {
        /// The item
        item: ItemNumber,
        /// Its type
        item_type: ItemType,
    },

    /// Child ranked at or above its parent
    TypeHierarchy {
        /// The parent
        parent: ItemNumber,
        /// Parent type
        parent_type: ItemType,
        /// The child
        child: ItemNumber,
        /// Child type
        child_type: ItemType,
    },

    /// Blocking reference whose target could not be looked up
    UnresolvedReference {
        /// The reference
        reference: IssueRef,
        /// Failure category
        failure: WarningKind,
        /// Underlying error text
        message: String,
        /// Items whose sections name the reference
        referenced_by: Vec<ItemNumber>,
    },

    /// In-map edge recorded on only one endpoint
    AsymmetricEdge {
        /// Item that records the edge
        item: ItemNumber,
        /// Other endpoint, which lacks the inverse
        other: ItemNumber,
        /// List of `other` the inverse is missing from
        missing: MissingSide,
    },
}

impl Finding {
    /// Returns `true` for structural errors.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::BlockingCycle { .. } | Self::TrackingCycle { .. } | Self::TrackingConflict { .. }
        )
    }
}

/// Findings of one health check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Traversal root
    pub root: IssueRef,

    /// Items examined
    pub items: usize,

    /// Structural errors
    pub errors: Vec<Finding>,

    /// Advisory warnings
    pub warnings: Vec<Finding>,
}

impl HealthReport {
    /// Returns `true` when no structural error was found.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

fn structural_findings(map: &NodeMap) -> Vec<Finding> {
    let graph = IssueGraph::new(map, &local_blocking_edges(map));
    tracing::debug!(
        items = graph.node_count(),
        tracking = graph.edge_count(EdgeKind::Tracking),
        blocking = graph.edge_count(EdgeKind::Blocking),
        "Checking structure"
    );
    let label = |n: ItemNumber| map.reference(n);

    let mut findings: Vec<Finding> = graph
        .blocking_cycles()
        .into_iter()
        .map(|cycle| Finding::BlockingCycle {
            path: cycle.map(label).path_labels(),
        })
        .collect();
    findings.extend(graph.tracking_cycles().into_iter().map(|cycle| {
        Finding::TrackingCycle {
            path: cycle.map(label).path_labels(),
        }
    }));
    findings.extend(map.conflicts.iter().map(|c| Finding::TrackingConflict {
        child: c.child,
        first_parent: c.first_parent,
        second_parent: c.second_parent,
    }));
    findings
}

fn item_findings(map: &NodeMap, options: &HealthOptions) -> Vec<Finding> {
    let mut findings = Vec::new();

    for item in map.items() {
        let parent = item.parent.and_then(|p| map.get(p));

        if let Some(parent) = parent
            && item.is_open()
            && !parent.is_open()
        {
            findings.push(Finding::Orphaned {
                item: item.number,
                parent: parent.number,
            });
        }

        let inactive = options.now - item.updated_at;
        if item.is_open() && inactive > options.stale_after {
            findings.push(Finding::Stale {
                item: item.number,
                days_inactive: inactive.num_days(),
            });
        }

        if let Some(item_type) = item.item_type
            && item_type.is_container()
            && item.is_leaf()
        {
            findings.push(Finding::ChildlessContainer {
                item: item.number,
                item_type,
            });
        }

        if let Some(parent) = parent
            && let (Some(parent_type), Some(child_type)) = (parent.item_type, item.item_type)
            && child_type.rank() >= parent_type.rank()
        {
            findings.push(Finding::TypeHierarchy {
                parent: parent.number,
                parent_type,
                child: item.number,
                child_type,
            });
        }
    }

    findings
}

fn asymmetric_edges(
    map: &NodeMap,
    sections: &BTreeMap<ItemNumber, DependencySection>,
) -> Vec<Finding> {
    let names = |section: Option<&DependencySection>, blocks: bool, who: ItemNumber| {
        section.is_some_and(|s| {
            let list = if blocks { &s.blocks } else { &s.blocked_by };
            list.iter().any(|e| e.target == map.reference(who))
        })
    };

    let mut findings = Vec::new();
    for (&number, section) in sections {
        for entry in &section.blocked_by {
            if let Some(other) = map.resolve(&entry.target)
                && !names(sections.get(&other.number), true, number)
            {
                findings.push(Finding::AsymmetricEdge {
                    item: number,
                    other: other.number,
                    missing: MissingSide::Blocks,
                });
            }
        }
        for entry in &section.blocks {
            if let Some(other) = map.resolve(&entry.target)
                && !names(sections.get(&other.number), false, number)
            {
                findings.push(Finding::AsymmetricEdge {
                    item: number,
                    other: other.number,
                    missing: MissingSide::BlockedBy,
                });
            }
        }
    }
    findings
}

async fn unresolved_references(
    tracker: &dyn IssueTracker,
    map: &NodeMap,
    sections: &BTreeMap<ItemNumber, DependencySection>,
) -> Vec<Finding> {
    let mut external: BTreeMap<IssueRef, Vec<ItemNumber>> = BTreeMap::new();
    for (&number, section) in sections {
        if !map.get(number).is_some_and(|item| item.is_open()) {
            continue;
        }
        for entry in section.blocked_by.iter().chain(&section.blocks) {
            if map.resolve(&entry.target).is_none() {
                let users = external.entry(entry.target.clone()).or_default();
                if !users.contains(&number) {
                    users.push(number);
                }
            }
        }
    }

    let mut resolver = BlockingResolver::new(tracker, map);
    for reference in external.keys() {
        resolver.resolve(reference).await;
    }

    resolver
        .into_warnings()
        .into_iter()
        .map(|warning| Finding::UnresolvedReference {
            referenced_by: external.get(&warning.reference).cloned().unwrap_or_default(),
            reference: warning.reference,
            failure: warning.kind,
            message: warning.message,
        })
        .collect()
}

/// Examine `map` for structural errors and advisory problems.
pub async fn check_health(
    tracker: &dyn IssueTracker,
    map: &NodeMap,
    options: &HealthOptions,
) -> HealthReport {
    let sections: BTreeMap<ItemNumber, DependencySection> = map
        .items()
        .map(|item| (item.number, parse_section(&item.body, &map.repo)))
        .collect();

    let errors = structural_findings(map);

    let mut warnings = item_findings(map, options);
    warnings.extend(unresolved_references(tracker, map, &sections).await);
    warnings.extend(asymmetric_edges(map, &sections));

    for finding in &errors {
        tracing::warn!(?finding, "Structural error");
    }
    tracing::info!(
        root = %map.reference(map.root),
        items = map.len(),
        errors = errors.len(),
        warnings = warnings.len(),
        "Health check complete"
    );

    HealthReport {
        root: map.reference(map.root),
        items: map.len(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemState, RepoSlug, TrackingConflict, WorkItem};
    use crate::tracker::InMemoryTracker;

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    fn item(number: u64, parent: Option<u64>, item_type: Option<ItemType>) -> WorkItem {
        let mut item = WorkItem::new(number, format!("Item {number}"));
        item.parent = parent;
        item.item_type = item_type;
        item
    }

    fn map_of(items: Vec<WorkItem>) -> NodeMap {
        let mut map = NodeMap::new(repo(), 1);
        for item in items {
            map.insert(item);
        }
        map
    }

    fn options() -> HealthOptions {
        HealthOptions::default()
    }

    #[tokio::test]
    async fn test_clean_graph_has_no_findings() {
        let mut epic = item(1, None, Some(ItemType::Epic));
        epic.children = vec![2];
        let map = map_of(vec![epic, item(2, Some(1), Some(ItemType::Task))]);

        let report = check_health(&InMemoryTracker::new(), &map, &options()).await;

        assert!(report.is_healthy());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[tokio::test]
    async fn test_blocking_cycle_reports_full_path() {
        let mut a = item(2, None, None);
        a.body = "Blocked by:\n- [ ] #3\n".into();
        let mut b = item(3, None, None);
        b.body = "Blocked by:\n- [ ] #2\n".into();
        let map = map_of(vec![item(1, None, None), a, b]);

        let report = check_health(&InMemoryTracker::new(), &map, &options()).await;

        assert_eq!(
            report.errors,
            vec![Finding::BlockingCycle {
                path: vec![
                    "acme/widgets#2".into(),
                    "acme/widgets#3".into(),
                    "acme/widgets#2".into()
                ]
            }]
        );
    }

    #[tokio::test]
    async fn test_conflicts_are_errors() {
        let mut map = map_of(vec![item(1, None, None)]);
        map.conflicts.push(TrackingConflict {
            child: 4,
            first_parent: 2,
            second_parent: 3,
        });

        let report = check_health(&InMemoryTracker::new(), &map, &options()).await;

        assert!(!report.is_healthy());
        assert!(report.errors[0].is_error());
    }

    #[tokio::test]
    async fn test_advisory_findings() {
        let mut closed_feature = item(2, Some(1), Some(ItemType::Feature));
        closed_feature.state = ItemState::Closed;
        closed_feature.children = vec![3];
        let mut stale = item(3, Some(2), Some(ItemType::Task));
        stale.updated_at = Utc::now() - Duration::days(90);
        let empty_epic = item(4, Some(1), Some(ItemType::Epic));
        let mut root = item(1, None, Some(ItemType::Feature));
        root.children = vec![2, 4];
        let map = map_of(vec![root, closed_feature, stale, empty_epic]);

        let report = check_health(&InMemoryTracker::new(), &map, &options()).await;

        assert!(report.is_healthy());
        assert!(report.warnings.contains(&Finding::Orphaned { item: 3, parent: 2 }));
        assert!(report.warnings.iter().any(|f| matches!(
            f,
            Finding::Stale { item: 3, days_inactive } if *days_inactive >= 89
        )));
        assert!(report.warnings.contains(&Finding::ChildlessContainer {
            item: 4,
            item_type: ItemType::Epic
        }));
        assert!(report.warnings.contains(&Finding::TypeHierarchy {
            parent: 1,
            parent_type: ItemType::Feature,
            child: 2,
            child_type: ItemType::Feature
        }));
    }

    #[tokio::test]
    async fn test_asymmetric_and_unresolved_references() {
        let mut a = item(2, None, None);
        a.body = "Blocked by:\n- [ ] #3\n- [ ] acme/other#9\n".into();
        let b = item(3, None, None);
        let map = map_of(vec![item(1, None, None), a, b]);

        let report = check_health(&InMemoryTracker::new(), &map, &options()).await;

        assert!(report.warnings.contains(&Finding::AsymmetricEdge {
            item: 2,
            other: 3,
            missing: MissingSide::Blocks
        }));
        assert!(report.warnings.iter().any(|f| matches!(
            f,
            Finding::UnresolvedReference { failure: WarningKind::Missing, referenced_by, .. }
                if referenced_by == &vec![2]
        )));
    }
}
