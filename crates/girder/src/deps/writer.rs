//! Writing blocking edges on both endpoints.
//!
//! [`set_dependency`] merges new references into an item's dependency
//! section and then makes sure every referenced item records the inverse
//! relation. The primary write happens first; inverse writes are best
//! effort and never roll it back.

use super::parser::{parse_section, upsert_section};
use super::{BlockingRef, DependencySection};
use crate::domain::{IssueRef, ItemState};
use crate::error::{Error, Result};
use crate::tracker::IssueTracker;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default number of concurrent lookups and cross-reference writes.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Edges to add to one item.
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    /// Item whose section is updated
    pub item: IssueRef,

    /// Items `item` is blocked by
    pub depends_on: Vec<IssueRef>,

    /// Items `item` blocks
    pub blocks: Vec<IssueRef>,

    /// Wave to record; `None` keeps the existing one
    pub wave: Option<u32>,

    /// Concurrent lookups and cross-reference writes (at least 1)
    pub concurrency: usize,
}

impl DependencyRequest {
    /// Create a request for `item` with no edges.
    pub fn new(item: IssueRef) -> Self {
        Self {
            item,
            depends_on: Vec::new(),
            blocks: Vec::new(),
            wave: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Result of [`set_dependency`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyUpdate {
    /// The updated item
    pub item: IssueRef,

    /// Full "Blocked by" list after the merge
    pub blocked_by: Vec<IssueRef>,

    /// Full "Blocks" list after the merge
    pub blocks: Vec<IssueRef>,

    /// Wave after the merge
    pub wave: Option<u32>,

    /// Whether the item's body was rewritten
    pub body_changed: bool,

    /// Referenced items confirmed to hold the inverse relation
    pub cross_refs_confirmed: usize,

    /// Referenced items whose inverse could not be confirmed
    pub cross_refs_failed: Vec<IssueRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inverse {
    /// Target's "Blocks" list must name the item
    Blocks,

    /// Target's "Blocked by" list must name the item
    BlockedBy,
}

/// Merge `entries` and `additions` keyed by target, rejecting self references.
fn merge(
    item: &IssueRef,
    entries: Vec<BlockingRef>,
    additions: &[IssueRef],
) -> Result<BTreeMap<IssueRef, BlockingRef>> {
    if let Some(own) = additions.iter().find(|r| *r == item) {
        return Err(Error::InvalidReference(format!(
            "{own} cannot depend on itself"
        )));
    }

    let mut merged = BTreeMap::new();
    for entry in entries {
        if &entry.target == item {
            tracing::warn!(item = %item, "Dropping self reference from dependency section");
            continue;
        }
        merged.entry(entry.target.clone()).or_insert(entry);
    }
    for target in additions {
        merged
            .entry(target.clone())
            .or_insert_with(|| BlockingRef::new(target.clone()));
    }
    Ok(merged)
}

/// Reject a target that would end up both blocking and blocked by `item`.
fn reject_two_way(
    item: &IssueRef,
    blocked_by: &BTreeMap<IssueRef, BlockingRef>,
    blocks: &BTreeMap<IssueRef, BlockingRef>,
) -> Result<()> {
    match blocked_by.keys().find(|target| blocks.contains_key(*target)) {
        Some(target) => Err(Error::Cycle {
            path: vec![item.to_string(), target.to_string(), item.to_string()],
        }),
        None => Ok(()),
    }
}

/// Refresh notes and checkboxes from the current title and state of each target.
async fn annotate(
    tracker: &dyn IssueTracker,
    lists: [&mut BTreeMap<IssueRef, BlockingRef>; 2],
    concurrency: usize,
) {
    let mut targets: Vec<IssueRef> = lists.iter().flat_map(|l| l.keys().cloned()).collect();
    targets.sort();
    targets.dedup();

    let statuses: BTreeMap<IssueRef, _> = stream::iter(targets)
        .map(|target| async move {
            let status = tracker.fetch_state(&target).await;
            (target, status)
        })
        .buffer_unordered(concurrency)
        .filter_map(|(target, status)| async move {
            match status {
                Ok(status) => Some((target, status)),
                Err(e) => {
                    tracing::debug!(reference = %target, error = %e, "Keeping previous note");
                    None
                }
            }
        })
        .collect()
        .await;

    for list in lists {
        for (target, entry) in list.iter_mut() {
            if let Some(status) = statuses.get(target) {
                entry.note.clone_from(&status.title);
                entry.checked = status.state == ItemState::Closed;
            }
        }
    }
}

/// Make sure `target` records `relation` towards `item`.
///
/// Returns `true` when a write was needed.
async fn ensure_inverse(
    tracker: &dyn IssueTracker,
    target: &IssueRef,
    item: &IssueRef,
    item_entry: &BlockingRef,
    relation: Inverse,
) -> Result<bool> {
    let tracked = tracker.fetch_item(target).await?;
    let body = tracked.item.body;
    let mut section = parse_section(&body, &target.repo);

    let list = match relation {
        Inverse::Blocks => &mut section.blocks,
        Inverse::BlockedBy => &mut section.blocked_by,
    };
    if list.iter().any(|entry| &entry.target == item) {
        return Ok(false);
    }

    list.push(item_entry.clone());
    list.sort_by(|a, b| a.target.cmp(&b.target));
    list.dedup_by(|a, b| a.target == b.target);

    let updated = upsert_section(&body, &section);
    tracker.update_body(target, &updated).await?;
    Ok(true)
}

/// Add blocking edges to an item and mirror them on the referenced items.
///
/// The item's section is regenerated from the union of its existing and the
/// requested references, sorted, annotated with each target's current title
/// and closed state where it can be fetched, and written back only when the
/// body changed. Every requested reference then gets the inverse relation;
/// targets that already hold it are confirmed without a write, so running
/// the same request twice yields the same edges and the same count.
///
/// # Errors
///
/// Returns `Error::InvalidReference` if the item references itself,
/// `Error::Cycle` if a target would both block and be blocked by the item,
/// and the tracker's error if the item cannot be read or written. Cross-reference
/// failures are logged and reported in [`DependencyUpdate::cross_refs_failed`].
pub async fn set_dependency(
    tracker: &dyn IssueTracker,
    request: &DependencyRequest,
) -> Result<DependencyUpdate> {
    let item = &request.item;
    let concurrency = request.concurrency.max(1);

    let tracked = tracker.fetch_item(item).await?;
    let existing = parse_section(&tracked.item.body, &item.repo);

    let mut blocked_by = merge(item, existing.blocked_by, &request.depends_on)?;
    let mut blocks = merge(item, existing.blocks, &request.blocks)?;
    reject_two_way(item, &blocked_by, &blocks)?;

    annotate(tracker, [&mut blocked_by, &mut blocks], concurrency).await;

    let section = DependencySection {
        blocked_by: blocked_by.into_values().collect(),
        blocks: blocks.into_values().collect(),
        wave: request.wave.or(existing.wave),
    };

    let updated = upsert_section(&tracked.item.body, &section);
    let body_changed = updated != tracked.item.body;
    if body_changed {
        tracker.update_body(item, &updated).await?;
        tracing::info!(item = %item, "Updated dependency section");
    } else {
        tracing::debug!(item = %item, "Dependency section already up to date");
    }

    let item_entry = BlockingRef {
        target: item.clone(),
        checked: tracked.item.state == ItemState::Closed,
        note: tracked.item.title.clone(),
    };

    // At most one write job per target body; two-way targets were rejected above.
    let jobs: BTreeMap<IssueRef, Inverse> = request
        .depends_on
        .iter()
        .map(|t| (t.clone(), Inverse::Blocks))
        .chain(request.blocks.iter().map(|t| (t.clone(), Inverse::BlockedBy)))
        .collect();

    let item_entry = &item_entry;
    let mut outcomes: Vec<(IssueRef, Result<bool>)> = stream::iter(jobs)
        .map(|(target, relation)| async move {
            let outcome = ensure_inverse(tracker, &target, item, item_entry, relation).await;
            (target, outcome)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut cross_refs_confirmed = 0;
    let mut cross_refs_failed = Vec::new();
    for (target, outcome) in outcomes {
        match outcome {
            Ok(written) => {
                cross_refs_confirmed += 1;
                tracing::debug!(
                    item = %item,
                    reference = %target,
                    written,
                    "Cross-reference confirmed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    item = %item,
                    reference = %target,
                    error = %e,
                    "Failed to update cross-reference"
                );
                cross_refs_failed.push(target);
            }
        }
    }

    Ok(DependencyUpdate {
        item: item.clone(),
        blocked_by: section.blocked_by.iter().map(|e| e.target.clone()).collect(),
        blocks: section.blocks.iter().map(|e| e.target.clone()).collect(),
        wave: section.wave,
        body_changed,
        cross_refs_confirmed,
        cross_refs_failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RepoSlug, WorkItem};
    use crate::tracker::InMemoryTracker;

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    fn r(number: u64) -> IssueRef {
        IssueRef::new(repo(), number)
    }

    #[test]
    fn test_merge_rejects_self_reference() {
        let err = merge(&r(1), Vec::new(), &[r(2), r(1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));
    }

    #[test]
    fn test_merge_deduplicates_and_sorts() {
        let existing = vec![BlockingRef::new(r(9)), BlockingRef::new(r(3))];
        let merged = merge(&r(1), existing, &[r(3), r(5)]).unwrap();
        let keys: Vec<_> = merged.keys().map(|k| k.number).collect();
        assert_eq!(keys, vec![3, 5, 9]);
    }

    #[test]
    fn test_two_way_target_is_a_cycle() {
        let blocked_by = merge(&r(1), Vec::new(), &[r(2), r(3)]).unwrap();
        let blocks = merge(&r(1), Vec::new(), &[r(3)]).unwrap();

        let err = reject_two_way(&r(1), &blocked_by, &blocks).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Cycle detected: acme/widgets#1 -> acme/widgets#3 -> acme/widgets#1"
        );
    }

    #[tokio::test]
    async fn test_missing_target_keeps_primary_write() {
        let tracker = InMemoryTracker::new();
        tracker.insert(&repo(), WorkItem::new(1, "Item")).await;

        let mut request = DependencyRequest::new(r(1));
        request.depends_on = vec![r(404)];

        let update = set_dependency(&tracker, &request).await.unwrap();

        assert!(update.body_changed);
        assert_eq!(update.blocked_by, vec![r(404)]);
        assert_eq!(update.cross_refs_confirmed, 0);
        assert_eq!(update.cross_refs_failed, vec![r(404)]);
        assert!(tracker.get(&r(1)).await.unwrap().body.contains("- [ ] acme/widgets#404"));
    }
}
