//! Resolving a blocking reference to the state of its target.
//!
//! A reference to an item of the node map reads the state from the map.
//! Anything else costs one [`IssueTracker::fetch_state`] lookup. A failed
//! lookup resolves to [`BlockingState::Unknown`], which blocks just like an
//! open target, and carries a warning saying whether the target is missing
//! or the lookup was merely unavailable.

use crate::domain::{IssueRef, ItemState, NodeMap};
use crate::error::Error;
use crate::tracker::IssueTracker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolved state of a blocking target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingState {
    /// Target is open
    Open,

    /// Target is closed
    Closed,

    /// Target state could not be determined
    Unknown,
}

impl BlockingState {
    /// Returns `true` unless the target is known to be closed.
    pub fn is_blocking(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl From<ItemState> for BlockingState {
    fn from(state: ItemState) -> Self {
        match state {
            ItemState::Open => Self::Open,
            ItemState::Closed => Self::Closed,
        }
    }
}

/// Why a lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// The remote reports no such item
    Missing,

    /// The lookup failed for another reason (network, rate limit, auth)
    Unavailable,
}

/// Advisory raised when a blocking reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    /// The unresolved reference
    pub reference: IssueRef,

    /// Failure category
    pub kind: WarningKind,

    /// Underlying error text
    pub message: String,
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved state
    pub state: BlockingState,

    /// Set when the lookup failed
    pub warning: Option<ResolutionWarning>,
}

impl Resolution {
    fn known(state: ItemState) -> Self {
        Self {
            state: state.into(),
            warning: None,
        }
    }
}

fn classify_failure(error: &Error) -> WarningKind {
    match error {
        Error::NotFound(_) => WarningKind::Missing,
        Error::Remote(remote) if remote.is_not_found() => WarningKind::Missing,
        _ => WarningKind::Unavailable,
    }
}

/// Resolve one reference without caching.
pub async fn resolve_blocking_state(
    tracker: &dyn IssueTracker,
    reference: &IssueRef,
    map: &NodeMap,
) -> Resolution {
    if let Some(item) = map.resolve(reference) {
        return Resolution::known(item.state);
    }

    match tracker.fetch_state(reference).await {
        Ok(status) => Resolution::known(status.state),
        Err(e) => {
            let kind = classify_failure(&e);
            tracing::warn!(
                reference = %reference,
                kind = ?kind,
                error = %e,
                "Could not resolve blocking reference, treating it as blocking"
            );
            Resolution {
                state: BlockingState::Unknown,
                warning: Some(ResolutionWarning {
                    reference: reference.clone(),
                    kind,
                    message: e.to_string(),
                }),
            }
        }
    }
}

/// Resolver that remembers remote lookups for the lifetime of one operation.
///
/// Warnings are collected once per distinct reference, however often it is
/// resolved.
pub struct BlockingResolver<'a> {
    tracker: &'a dyn IssueTracker,
    map: &'a NodeMap,
    cache: HashMap<IssueRef, Resolution>,
    warnings: Vec<ResolutionWarning>,
}

impl<'a> BlockingResolver<'a> {
    /// Create a resolver over `map`, falling back to `tracker`.
    pub fn new(tracker: &'a dyn IssueTracker, map: &'a NodeMap) -> Self {
        Self {
            tracker,
            map,
            cache: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Resolve `reference`, consulting the cache first.
    pub async fn resolve(&mut self, reference: &IssueRef) -> BlockingState {
        if let Some(item) = self.map.resolve(reference) {
            return item.state.into();
        }
        if let Some(cached) = self.cache.get(reference) {
            return cached.state;
        }

        let resolution = resolve_blocking_state(self.tracker, reference, self.map).await;
        if let Some(warning) = &resolution.warning {
            self.warnings.push(warning.clone());
        }
        let state = resolution.state;
        self.cache.insert(reference.clone(), resolution);
        state
    }

    /// Number of remote lookups performed.
    pub fn lookups(&self) -> usize {
        self.cache.len()
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    /// Consume the resolver, returning its warnings.
    pub fn into_warnings(self) -> Vec<ResolutionWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RepoSlug, WorkItem};
    use crate::tracker::InMemoryTracker;

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    fn other() -> RepoSlug {
        RepoSlug::new("acme", "gears")
    }

    #[tokio::test]
    async fn test_in_map_reference_needs_no_lookup() {
        let tracker = InMemoryTracker::new();
        let mut map = NodeMap::new(repo(), 1);
        let mut closed = WorkItem::new(2, "Done");
        closed.state = ItemState::Closed;
        map.insert(closed);

        let resolution = resolve_blocking_state(&tracker, &IssueRef::new(repo(), 2), &map).await;
        assert_eq!(resolution.state, BlockingState::Closed);
        assert!(resolution.warning.is_none());
    }

    #[tokio::test]
    async fn test_missing_and_unavailable_are_distinguished() {
        let tracker = InMemoryTracker::new();
        tracker.insert(&other(), WorkItem::new(5, "Flaky")).await;
        tracker.fail_on(IssueRef::new(other(), 5)).await;
        let map = NodeMap::new(repo(), 1);

        let missing = resolve_blocking_state(&tracker, &IssueRef::new(other(), 4), &map).await;
        assert_eq!(missing.state, BlockingState::Unknown);
        assert_eq!(missing.warning.unwrap().kind, WarningKind::Missing);

        let flaky = resolve_blocking_state(&tracker, &IssueRef::new(other(), 5), &map).await;
        assert_eq!(flaky.state, BlockingState::Unknown);
        assert_eq!(flaky.warning.unwrap().kind, WarningKind::Unavailable);
        assert!(BlockingState::Unknown.is_blocking());
    }

    #[tokio::test]
    async fn test_resolver_caches_lookups_and_warnings() {
        let tracker = InMemoryTracker::new();
        let mut external = WorkItem::new(3, "External");
        external.state = ItemState::Closed;
        tracker.insert(&other(), external).await;
        let map = NodeMap::new(repo(), 1);

        let mut resolver = BlockingResolver::new(&tracker, &map);
        let closed = IssueRef::new(other(), 3);
        let missing = IssueRef::new(other(), 99);

        assert_eq!(resolver.resolve(&closed).await, BlockingState::Closed);
        assert_eq!(resolver.resolve(&closed).await, BlockingState::Closed);
        assert_eq!(resolver.resolve(&missing).await, BlockingState::Unknown);
        assert_eq!(resolver.resolve(&missing).await, BlockingState::Unknown);

        assert_eq!(resolver.lookups(), 2);
        assert_eq!(resolver.into_warnings().len(), 1);
    }
}
