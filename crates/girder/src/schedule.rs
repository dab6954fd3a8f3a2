//! Picking the next item to work on.
//!
//! # Strategies
//!
//! - `Depth`: deepest first
//! - `Labels`: highest label priority first
//! - `Oldest`: creation date ascending
//! - `Priority` (default): depth, then label priority, then age
//!
//! The item number is always the final tiebreaker, so every strategy is a
//! total order and the same ready set always yields the same pick.

use crate::domain::{NextStrategy, WorkItem};
use std::cmp::Ordering;

/// Compare two items under `strategy`; `Less` means "work on `a` first".
pub fn compare(a: &WorkItem, b: &WorkItem, strategy: NextStrategy) -> Ordering {
    let by_number = a.number.cmp(&b.number);
    match strategy {
        NextStrategy::Depth => b.depth.cmp(&a.depth).then(by_number),
        NextStrategy::Labels => b.priority().cmp(&a.priority()).then(by_number),
        NextStrategy::Oldest => a.created_at.cmp(&b.created_at).then(by_number),
        NextStrategy::Priority => b
            .depth
            .cmp(&a.depth)
            .then(b.priority().cmp(&a.priority()))
            .then(a.created_at.cmp(&b.created_at))
            .then(by_number),
    }
}

/// Sort `items` so the preferred one comes first.
pub fn sort_by_strategy(items: &mut [WorkItem], strategy: NextStrategy) {
    items.sort_by(|a, b| compare(a, b, strategy));
}

/// The preferred item of `items`, or `None` when empty.
pub fn select_next(items: &[WorkItem], strategy: NextStrategy) -> Option<&WorkItem> {
    items.iter().min_by(|a, b| compare(a, b, strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rstest::rstest;

    fn item(number: u64, depth: usize, label: Option<&str>, age_days: i64) -> WorkItem {
        let mut item = WorkItem::new(number, format!("Item {number}"));
        item.depth = depth;
        if let Some(label) = label {
            item.labels.insert(label.to_string());
        }
        item.created_at = Utc::now() - Duration::days(age_days);
        item
    }

    fn sample() -> Vec<WorkItem> {
        vec![
            item(10, 1, Some("critical"), 1),
            item(11, 2, Some("low"), 5),
            item(12, 2, Some("high"), 2),
            item(13, 1, None, 30),
        ]
    }

    #[rstest]
    #[case::depth(NextStrategy::Depth, 11)]
    #[case::labels(NextStrategy::Labels, 10)]
    #[case::oldest(NextStrategy::Oldest, 13)]
    #[case::priority(NextStrategy::Priority, 12)]
    fn test_select_next(#[case] strategy: NextStrategy, #[case] expected: u64) {
        let items = sample();
        assert_eq!(select_next(&items, strategy).unwrap().number, expected);
    }

    #[test]
    fn test_empty_input() {
        assert!(select_next(&[], NextStrategy::Priority).is_none());
    }

    #[test]
    fn test_number_breaks_full_ties() {
        let created = Utc::now();
        let mut a = item(7, 1, Some("high"), 0);
        let mut b = item(3, 1, Some("high"), 0);
        a.created_at = created;
        b.created_at = created;
        let items = vec![a, b];

        assert_eq!(select_next(&items, NextStrategy::Priority).unwrap().number, 3);
    }

    #[test]
    fn test_sort_matches_select() {
        let mut items = sample();
        items.reverse();
        let first = select_next(&items, NextStrategy::Priority).unwrap().number;

        sort_by_strategy(&mut items, NextStrategy::Priority);

        let order: Vec<u64> = items.iter().map(|i| i.number).collect();
        assert_eq!(order, vec![12, 11, 10, 13]);
        assert_eq!(order[0], first);
    }
}
