//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use girder::domain::{IssueRef, ItemNumber, ItemState, RepoSlug, WorkItem};
use girder::error::Result as GirderResult;
use girder::remote::{Request, Transport, TransportError};
use girder::tracker::{InMemoryTracker, IssueTracker, ItemStatus, NewItem, TrackedItem};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::Instant;

/// Repository every fixture lives in.
pub fn repo() -> RepoSlug {
    RepoSlug::new("acme", "widgets")
}

/// Transport replaying a fixed script of replies and recording call times.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    /// Replies are consumed in order; an exhausted script fails permanently.
    pub fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// `failures` transient 503 replies followed by one success.
    pub fn flaky(failures: usize, success: Value) -> Self {
        let mut replies: Vec<Result<Value, TransportError>> = (0..failures)
            .map(|_| Err(service_unavailable()))
            .collect();
        replies.push(Ok(success));
        Self::new(replies)
    }

    /// Number of executed requests.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which requests were executed.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, _request: &Request) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("script exhausted")))
    }
}

/// The transient failure used throughout the retry tests.
pub fn service_unavailable() -> TransportError {
    TransportError::http(503, "HTTP 503: Service Unavailable")
}

/// Open leaf item.
pub fn item(number: ItemNumber, title: &str) -> WorkItem {
    WorkItem::new(number, title)
}

/// Open item with tracking children.
pub fn parent(number: ItemNumber, title: &str, children: &[ItemNumber]) -> WorkItem {
    let mut item = WorkItem::new(number, title);
    item.children = children.to_vec();
    item
}

/// Closed leaf item.
pub fn closed(number: ItemNumber, title: &str) -> WorkItem {
    let mut item = WorkItem::new(number, title);
    item.state = ItemState::Closed;
    item
}

/// Leaf item whose body lists `blockers` under "Blocked by".
pub fn blocked_by(number: ItemNumber, title: &str, blockers: &[ItemNumber]) -> WorkItem {
    let mut item = WorkItem::new(number, title);
    let lines: Vec<String> = blockers.iter().map(|n| format!("- [ ] #{n}")).collect();
    item.body = format!("**Blocked by:**\n{}\n", lines.join("\n"));
    item
}

/// Tracker holding `items` in [`repo`].
pub async fn tracker_with(items: Vec<WorkItem>) -> InMemoryTracker {
    let tracker = InMemoryTracker::new();
    for item in items {
        tracker.insert(&repo(), item).await;
    }
    tracker
}

/// Tracker that yields between a read and the caller's next step, so
/// concurrent read-modify-write jobs interleave the way they do against a
/// real remote. Counts body writes per item.
pub struct InterleavingTracker {
    /// Backing store
    pub inner: InMemoryTracker,
    writes: Mutex<BTreeMap<ItemNumber, usize>>,
}

impl InterleavingTracker {
    /// Wrap `inner`.
    pub fn new(inner: InMemoryTracker) -> Self {
        Self {
            inner,
            writes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Body writes per item number.
    pub fn writes(&self) -> BTreeMap<ItemNumber, usize> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for InterleavingTracker {
    async fn fetch_item(&self, reference: &IssueRef) -> GirderResult<TrackedItem> {
        let tracked = self.inner.fetch_item(reference).await;
        tokio::task::yield_now().await;
        tracked
    }

    async fn fetch_state(&self, reference: &IssueRef) -> GirderResult<ItemStatus> {
        self.inner.fetch_state(reference).await
    }

    async fn update_body(&self, reference: &IssueRef, body: &str) -> GirderResult<()> {
        *self
            .writes
            .lock()
            .unwrap()
            .entry(reference.number)
            .or_default() += 1;
        self.inner.update_body(reference, body).await
    }

    async fn create_item(&self, repo: &RepoSlug, item: &NewItem) -> GirderResult<ItemNumber> {
        self.inner.create_item(repo, item).await
    }

    async fn link_child(&self, parent: &IssueRef, child: &IssueRef) -> GirderResult<()> {
        self.inner.link_child(parent, child).await
    }
}
