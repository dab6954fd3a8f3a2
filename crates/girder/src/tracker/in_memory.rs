//! In-memory tracker backend.
//!
//! Items live in a `BTreeMap` keyed by reference and are **lost when the
//! process exits**. The store is wrapped in `Arc<Mutex<_>>` so clones share
//! state across tasks, which lets a test keep a handle for inspection while
//! the code under test owns another.
//!
//! Individual references can be marked as failing; every access to them
//! then returns a transient remote error, which is how fetch and lookup
//! failure paths are exercised without a network.

use super::{IssueTracker, ItemStatus, NewItem, TrackedItem};
use crate::domain::{IssueRef, ItemNumber, RepoSlug, WorkItem};
use crate::error::{Error, Result};
use crate::remote::{ApiError, RemoteError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<IssueRef, WorkItem>,
    failing: BTreeSet<IssueRef>,
    body_writes: usize,
    created: Vec<IssueRef>,
    links: Vec<(IssueRef, IssueRef)>,
}

impl Inner {
    fn check(&self, reference: &IssueRef) -> Result<&WorkItem> {
        if self.failing.contains(reference) {
            return Err(Error::Remote(RemoteError {
                errors: vec![ApiError::new("503 Service Unavailable").with_type("HTTP_503")],
                attempts: 1,
            }));
        }
        self.items
            .get(reference)
            .ok_or_else(|| Error::NotFound(reference.clone()))
    }

    fn flat_record(item: &WorkItem) -> WorkItem {
        let mut record = item.clone();
        // A stored `child_total` above the child list simulates unretrieved children.
        record.child_total = item.child_total.max(item.children.len());
        record.children.clear();
        record.depth = 0;
        record.parent = None;
        record
    }

    fn next_number(&self, repo: &RepoSlug) -> ItemNumber {
        self.items
            .keys()
            .filter(|r| &r.repo == repo)
            .map(|r| r.number)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// [`IssueTracker`] holding items in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracker {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `item` in `repo`, replacing any item with the same number.
    ///
    /// `item.children` is taken as the item's tracking children.
    pub async fn insert(&self, repo: &RepoSlug, item: WorkItem) {
        let reference = IssueRef::new(repo.clone(), item.number);
        self.inner.lock().await.items.insert(reference, item);
    }

    /// Make every access to `reference` fail with a transient error.
    pub async fn fail_on(&self, reference: IssueRef) {
        self.inner.lock().await.failing.insert(reference);
    }

    /// Current stored copy of an item.
    pub async fn get(&self, reference: &IssueRef) -> Option<WorkItem> {
        self.inner.lock().await.items.get(reference).cloned()
    }

    /// Number of body writes performed so far.
    pub async fn body_writes(&self) -> usize {
        self.inner.lock().await.body_writes
    }

    /// References created through [`IssueTracker::create_item`], in order.
    pub async fn created(&self) -> Vec<IssueRef> {
        self.inner.lock().await.created.clone()
    }

    /// `(parent, child)` pairs linked through [`IssueTracker::link_child`], in order.
    pub async fn links(&self) -> Vec<(IssueRef, IssueRef)> {
        self.inner.lock().await.links.clone()
    }
}

#[async_trait]
impl IssueTracker for InMemoryTracker {
    async fn fetch_item(&self, reference: &IssueRef) -> Result<TrackedItem> {
        let inner = self.inner.lock().await;
        let stored = inner.check(reference)?;

        let item = Inner::flat_record(stored);
        let children = stored
            .children
            .iter()
            .filter_map(|n| {
                inner
                    .items
                    .get(&IssueRef::new(reference.repo.clone(), *n))
                    .map(Inner::flat_record)
            })
            .collect();

        Ok(TrackedItem { item, children })
    }

    async fn fetch_state(&self, reference: &IssueRef) -> Result<ItemStatus> {
        let inner = self.inner.lock().await;
        let stored = inner.check(reference)?;
        Ok(ItemStatus {
            title: stored.title.clone(),
            state: stored.state,
        })
    }

    async fn update_body(&self, reference: &IssueRef, body: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.check(reference)?;
        if let Some(item) = inner.items.get_mut(reference) {
            item.body = body.to_string();
            item.updated_at = Utc::now();
        }
        inner.body_writes += 1;
        Ok(())
    }

    async fn create_item(&self, repo: &RepoSlug, new: &NewItem) -> Result<ItemNumber> {
        if new.title.trim().is_empty() {
            return Err(Error::InvalidInput("title cannot be empty".to_string()));
        }

        let mut inner = self.inner.lock().await;
        let number = inner.next_number(repo);

        let mut item = WorkItem::new(number, new.title.clone());
        item.body.clone_from(&new.body);
        item.item_type = new.item_type;
        item.labels = new.labels.iter().cloned().collect();

        let reference = IssueRef::new(repo.clone(), number);
        inner.items.insert(reference.clone(), item);
        inner.created.push(reference);
        Ok(number)
    }

    async fn link_child(&self, parent: &IssueRef, child: &IssueRef) -> Result<()> {
        if parent.repo != child.repo {
            return Err(Error::InvalidInput(format!(
                "cannot link {child} under {parent}: children must share the parent's repository"
            )));
        }

        let mut inner = self.inner.lock().await;
        inner.check(child)?;
        inner.check(parent)?;
        if let Some(item) = inner.items.get_mut(parent)
            && !item.children.contains(&child.number)
        {
            item.children.push(child.number);
        }
        inner.links.push((parent.clone(), child.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemState, ItemType};

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    #[tokio::test]
    async fn test_fetch_item_lists_children_with_totals() {
        let tracker = InMemoryTracker::new();
        let mut root = WorkItem::new(1, "Root");
        root.children = vec![2, 3];
        let mut feature = WorkItem::new(2, "Feature");
        feature.children = vec![4];
        tracker.insert(&repo(), root).await;
        tracker.insert(&repo(), feature).await;
        tracker.insert(&repo(), WorkItem::new(3, "Leaf")).await;
        tracker.insert(&repo(), WorkItem::new(4, "Grandchild")).await;

        let tracked = tracker.fetch_item(&IssueRef::new(repo(), 1)).await.unwrap();

        assert_eq!(tracked.item.child_total, 2);
        assert!(tracked.item.children.is_empty());
        let numbers: Vec<_> = tracked.children.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(tracked.children[0].child_total, 1);
        assert_eq!(tracked.children[1].child_total, 0);
    }

    #[tokio::test]
    async fn test_missing_and_failing_items() {
        let tracker = InMemoryTracker::new();
        tracker.insert(&repo(), WorkItem::new(1, "One")).await;
        tracker.fail_on(IssueRef::new(repo(), 1)).await;

        let err = tracker.fetch_state(&IssueRef::new(repo(), 1)).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref e) if e.is_transient()));

        let err = tracker.fetch_state(&IssueRef::new(repo(), 2)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_and_link() {
        let tracker = InMemoryTracker::new();
        let epic = tracker
            .create_item(
                &repo(),
                &NewItem {
                    title: "Epic".into(),
                    item_type: Some(ItemType::Epic),
                    ..NewItem::default()
                },
            )
            .await
            .unwrap();
        let task = tracker
            .create_item(
                &repo(),
                &NewItem {
                    title: "Task".into(),
                    ..NewItem::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((epic, task), (1, 2));

        let parent = IssueRef::new(repo(), epic);
        let child = IssueRef::new(repo(), task);
        tracker.link_child(&parent, &child).await.unwrap();
        tracker.link_child(&parent, &child).await.unwrap();

        let stored = tracker.get(&parent).await.unwrap();
        assert_eq!(stored.children, vec![2]);
        assert_eq!(stored.item_type, Some(ItemType::Epic));
        assert_eq!(stored.state, ItemState::Open);
        assert_eq!(tracker.links().await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_body_counts_writes() {
        let tracker = InMemoryTracker::new();
        tracker.insert(&repo(), WorkItem::new(1, "One")).await;
        let reference = IssueRef::new(repo(), 1);

        tracker.update_body(&reference, "hello").await.unwrap();

        assert_eq!(tracker.get(&reference).await.unwrap().body, "hello");
        assert_eq!(tracker.body_writes().await, 1);
    }
}
