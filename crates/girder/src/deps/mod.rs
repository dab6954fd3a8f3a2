//! Blocking dependencies recorded in item bodies.
//!
//! Blocking edges live as text in a reserved section of each item's body:
//!
//! ```text
//! ## Dependencies
//!
//! **Blocked by:**
//! - [ ] owner/repo#12 Title of blocker
//! - [x] owner/repo#7 Closed blocker
//!
//! **Blocks:**
//! - [ ] owner/repo#20 Dependent title
//!
//! **Wave:** 2
//! ```
//!
//! All reading and regeneration of that text happens in [`parser`]; the rest
//! of the crate only sees [`DependencySection`] values. [`resolve`] turns a
//! reference into a blocking state and [`writer`] keeps both endpoints of an
//! edge in agreement.

pub mod parser;
pub mod resolve;
pub mod writer;

pub use parser::{parse_blocking, parse_blocks, parse_section, render_section, upsert_section};
pub use resolve::{
    BlockingResolver, BlockingState, Resolution, ResolutionWarning, WarningKind,
    resolve_blocking_state,
};
pub use writer::{DependencyRequest, DependencyUpdate, set_dependency};

use crate::domain::{IssueRef, ItemNumber, NodeMap};
use serde::{Deserialize, Serialize};

/// One checklist entry of a dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingRef {
    /// Referenced item
    pub target: IssueRef,

    /// Whether the checkbox is ticked (the target was closed when last written)
    pub checked: bool,

    /// Free text after the reference, kept for display only
    pub note: String,
}

impl BlockingRef {
    /// Create an unchecked entry with no note.
    pub fn new(target: IssueRef) -> Self {
        Self {
            target,
            checked: false,
            note: String::new(),
        }
    }
}

/// Parsed dependency section of one body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySection {
    /// Items this one waits on
    pub blocked_by: Vec<BlockingRef>,

    /// Items waiting on this one
    pub blocks: Vec<BlockingRef>,

    /// Optional wave ordinal
    pub wave: Option<u32>,
}

impl DependencySection {
    /// Returns `true` if the section carries no references and no wave.
    pub fn is_empty(&self) -> bool {
        self.blocked_by.is_empty() && self.blocks.is_empty() && self.wave.is_none()
    }
}

/// Blocking edges between items of `map`, as `(blocker, blocked)` pairs.
///
/// Both the "Blocked by" list of the blocked item and the "Blocks" list of
/// the blocker contribute; references leaving the map are ignored. The
/// result is sorted and free of duplicates.
pub fn local_blocking_edges(map: &NodeMap) -> Vec<(ItemNumber, ItemNumber)> {
    let mut edges = std::collections::BTreeSet::new();

    for item in map.items() {
        let section = parse_section(&item.body, &map.repo);
        for entry in &section.blocked_by {
            if let Some(blocker) = map.resolve(&entry.target) {
                edges.insert((blocker.number, item.number));
            }
        }
        for entry in &section.blocks {
            if let Some(blocked) = map.resolve(&entry.target) {
                edges.insert((item.number, blocked.number));
            }
        }
    }

    edges.into_iter().collect()
}
