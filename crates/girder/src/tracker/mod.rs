//! Issue tracker abstraction.
//!
//! Every component that reads or writes remote items does so through the
//! [`IssueTracker`] trait. Two implementations are provided:
//!
//! - [`GithubTracker`]: GitHub Issues with sub-issues, over the GraphQL API
//!   via a [`RemoteClient`](crate::remote::RemoteClient)
//! - [`InMemoryTracker`]: an ephemeral store with the same semantics, used by
//!   tests and for offline experiments
//!
//! # Architecture
//!
//! The trait is async and object-safe, so callers take `&dyn IssueTracker`.
//! Records returned by [`IssueTracker::fetch_item`] are flat: `depth`,
//! `parent` and `children` are left for the graph fetcher to fill in, while
//! `child_total` reports how many children the remote knows about.

mod github;
mod in_memory;

pub use github::GithubTracker;
pub use in_memory::InMemoryTracker;

use crate::domain::{IssueRef, ItemNumber, ItemState, ItemType, RepoSlug, WorkItem};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An item together with its immediate tracking children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedItem {
    /// The requested item
    pub item: WorkItem,

    /// Immediate children as full records, in remote order
    pub children: Vec<WorkItem>,
}

/// Title and state of a single item, as returned by a state lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatus {
    /// Issue title
    pub title: String,

    /// Current state
    pub state: ItemState,
}

/// Data for creating a new item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    /// Issue title
    pub title: String,

    /// Issue body
    pub body: String,

    /// Issue type
    pub item_type: Option<ItemType>,

    /// Label names
    pub labels: Vec<String>,
}

/// Read/write access to a remote issue store.
///
/// # Error Handling
///
/// - `Error::NotFound`: the referenced item does not exist
/// - `Error::Remote`: the remote failed permanently or after retries
/// - `Error::UnexpectedResponse`: the remote answered with an undecodable payload
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch one item and the records of its immediate children.
    async fn fetch_item(&self, reference: &IssueRef) -> Result<TrackedItem>;

    /// Look up only the title and state of one item.
    async fn fetch_state(&self, reference: &IssueRef) -> Result<ItemStatus>;

    /// Replace an item's body.
    async fn update_body(&self, reference: &IssueRef, body: &str) -> Result<()>;

    /// Create an item in `repo` and return its number.
    async fn create_item(&self, repo: &RepoSlug, item: &NewItem) -> Result<ItemNumber>;

    /// Add a tracking edge making `child` a child of `parent`.
    async fn link_child(&self, parent: &IssueRef, child: &IssueRef) -> Result<()>;
}
