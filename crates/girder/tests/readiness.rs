//! Readiness and next-item selection over fetched hierarchies.

mod common;

use common::{blocked_by, closed, item, parent, repo, tracker_with};
use girder::domain::{IssueRef, NextStrategy, ReadyFilter, ReadyOrder};
use girder::fetch::{FetchOptions, fetch_graph};
use girder::ready::resolve_ready;
use girder::schedule::select_next;

fn root() -> IssueRef {
    IssueRef::new(repo(), 1)
}

fn numbers(items: &[girder::domain::WorkItem]) -> Vec<u64> {
    items.iter().map(|i| i.number).collect()
}

#[tokio::test]
async fn test_chain_only_unblocked_item_is_ready() {
    // A blocked by B, B blocked by C.
    let tracker = tracker_with(vec![
        parent(1, "Root", &[2, 3, 4]),
        blocked_by(2, "A", &[3]),
        blocked_by(3, "B", &[4]),
        item(4, "C"),
    ])
    .await;

    let map = fetch_graph(&tracker, &root(), &FetchOptions::default())
        .await
        .unwrap();
    let report = resolve_ready(&tracker, &map, &ReadyFilter::default(), ReadyOrder::Number).await;

    assert_eq!(numbers(&report.items), vec![4]);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_closing_blocker_releases_dependent() {
    let tracker = tracker_with(vec![
        parent(1, "Root", &[2, 3, 4]),
        blocked_by(2, "A", &[3]),
        blocked_by(3, "B", &[4]),
        closed(4, "C"),
    ])
    .await;

    let map = fetch_graph(&tracker, &root(), &FetchOptions::default())
        .await
        .unwrap();
    let report = resolve_ready(&tracker, &map, &ReadyFilter::default(), ReadyOrder::Number).await;

    assert_eq!(numbers(&report.items), vec![3]);
}

#[tokio::test]
async fn test_ready_never_contains_root_or_containers() {
    let tracker = tracker_with(vec![
        parent(1, "Root", &[2, 5]),
        parent(2, "Feature", &[3, 4]),
        item(3, "Task one"),
        blocked_by(4, "Task two", &[3]),
        item(5, "Loose task"),
    ])
    .await;

    let map = fetch_graph(&tracker, &root(), &FetchOptions::default())
        .await
        .unwrap();
    let report = resolve_ready(&tracker, &map, &ReadyFilter::default(), ReadyOrder::Number).await;

    assert_eq!(numbers(&report.items), vec![3, 5]);
    for ready in &report.items {
        assert_ne!(ready.number, map.root);
        assert!(ready.is_leaf());
        assert!(ready.is_open());
    }
}

#[tokio::test]
async fn test_depth_limit_keeps_truncated_containers_out() {
    let tracker = tracker_with(vec![
        parent(1, "Root", &[2]),
        parent(2, "Epic", &[3]),
        parent(3, "Feature", &[4]),
        parent(4, "Story", &[5]),
        item(5, "Too deep"),
    ])
    .await;

    let map = fetch_graph(&tracker, &root(), &FetchOptions::default())
        .await
        .unwrap();
    let report = resolve_ready(&tracker, &map, &ReadyFilter::default(), ReadyOrder::Number).await;

    assert!(map.get(4).unwrap().children_truncated());
    assert!(report.items.is_empty());
}

#[tokio::test]
async fn test_next_prefers_deepest_item() {
    let tracker = tracker_with(vec![
        parent(1, "Root", &[2, 3]),
        parent(2, "Feature", &[4]),
        item(3, "Shallow"),
        item(4, "Deep"),
    ])
    .await;

    let map = fetch_graph(&tracker, &root(), &FetchOptions::default())
        .await
        .unwrap();
    let report = resolve_ready(&tracker, &map, &ReadyFilter::default(), ReadyOrder::Number).await;

    let next = select_next(&report.items, NextStrategy::Priority).unwrap();
    assert_eq!(next.number, 4);
    assert_eq!(
        select_next(&report.items, NextStrategy::Priority).unwrap().number,
        next.number
    );
}

#[tokio::test]
async fn test_unreachable_blocker_blocks_with_warning() {
    let tracker = tracker_with(vec![
        parent(1, "Root", &[2, 3]),
        blocked_by(2, "Waits on 9", &[9]),
        item(3, "Free"),
    ])
    .await;
    tracker.fail_on(IssueRef::new(repo(), 9)).await;

    let map = fetch_graph(&tracker, &root(), &FetchOptions::default())
        .await
        .unwrap();
    let report = resolve_ready(&tracker, &map, &ReadyFilter::default(), ReadyOrder::Number).await;

    assert_eq!(numbers(&report.items), vec![3]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].reference, IssueRef::new(repo(), 9));
}
