//! Readiness resolution.
//!
//! An item is ready when all of the following hold:
//!
//! 1. it is not the traversal root
//! 2. it is a leaf (no tracking children, fetched or not)
//! 3. it is open, and so is its parent when the parent is in the map
//! 4. every "Blocked by" reference resolves to a closed item
//! 5. it matches the caller's [`ReadyFilter`]
//!
//! The cheap structural checks run first so that blocking lookups are only
//! issued for real candidates. References that cannot be resolved count as
//! blocking and come back as warnings.

use crate::deps::{BlockingResolver, ResolutionWarning, parse_blocking};
use crate::domain::{NodeMap, ReadyFilter, ReadyOrder, WorkItem};
use crate::tracker::IssueTracker;
use serde::Serialize;

/// Ready items plus the warnings raised while resolving their blockers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadyReport {
    /// Ready items in the requested order
    pub items: Vec<WorkItem>,

    /// Blocking references that could not be resolved
    pub warnings: Vec<ResolutionWarning>,
}

fn is_candidate(map: &NodeMap, item: &WorkItem, filter: &ReadyFilter) -> bool {
    if item.number == map.root || !item.is_leaf() || !item.is_open() {
        return false;
    }

    let parent_open = item
        .parent
        .and_then(|parent| map.get(parent))
        .is_none_or(WorkItem::is_open);

    parent_open && filter.matches(item)
}

async fn is_blocked(resolver: &mut BlockingResolver<'_>, map: &NodeMap, item: &WorkItem) -> bool {
    for entry in parse_blocking(&item.body, &map.repo) {
        let state = resolver.resolve(&entry.target).await;
        if state.is_blocking() {
            tracing::debug!(item = item.number, blocker = %entry.target, ?state, "Item is blocked");
            return true;
        }
    }
    false
}

/// Sort ready items; the item number breaks every tie.
pub fn sort_ready(items: &mut [WorkItem], order: ReadyOrder) {
    match order {
        ReadyOrder::Priority => items.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then(a.number.cmp(&b.number))
        }),
        ReadyOrder::Number => items.sort_by_key(|item| item.number),
        ReadyOrder::Title => {
            items.sort_by(|a, b| a.title.cmp(&b.title).then(a.number.cmp(&b.number)));
        }
    }
}

/// Items of `map` that can be started now.
pub async fn resolve_ready(
    tracker: &dyn IssueTracker,
    map: &NodeMap,
    filter: &ReadyFilter,
    order: ReadyOrder,
) -> ReadyReport {
    let mut resolver = BlockingResolver::new(tracker, map);
    let mut items = Vec::new();

    for item in map.items() {
        if !is_candidate(map, item, filter) {
            continue;
        }
        if is_blocked(&mut resolver, map, item).await {
            continue;
        }
        items.push(item.clone());
    }

    sort_ready(&mut items, order);
    tracing::debug!(
        root = map.root,
        ready = items.len(),
        lookups = resolver.lookups(),
        "Resolved ready items"
    );

    ReadyReport {
        items,
        warnings: resolver.into_warnings(),
    }
}
