//! Domain types for dependency tracking.
//!
//! This module contains the core data model shared by the fetcher, the
//! readiness resolver, the scheduler and the health checker: work items,
//! references between them, and the node map produced by one traversal.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Platform-assigned issue number.
pub type ItemNumber = u64;

/// Repository identifier (`owner/name`).
///
/// Both parts are stored lower-cased so that references typed with a
/// different case compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    /// Create a repository slug from its two parts.
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            owner: owner.as_ref().trim().to_lowercase(),
            name: name.as_ref().trim().to_lowercase(),
        }
    }

    /// Repository owner (user or organization).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_slug_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepoSlug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let Some((owner, name)) = trimmed.split_once('/') else {
            return Err(Error::InvalidReference(format!(
                "repository '{trimmed}' must have the form owner/name"
            )));
        };
        if !is_slug_part(owner) || !is_slug_part(name) {
            return Err(Error::InvalidReference(format!(
                "repository '{trimmed}' must have the form owner/name"
            )));
        }
        Ok(Self::new(owner, name))
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.to_string()
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A reference to one issue, possibly in another repository.
///
/// The canonical text form is `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct IssueRef {
    /// Repository that owns the issue
    pub repo: RepoSlug,

    /// Issue number within the repository
    pub number: ItemNumber,
}

impl IssueRef {
    /// Create a reference from its parts.
    pub fn new(repo: RepoSlug, number: ItemNumber) -> Self {
        Self { repo, number }
    }

    /// Parse a reference token, resolving bare numbers against `default_repo`.
    ///
    /// Accepted forms: `12`, `#12`, `owner/repo#12` and
    /// `https://github.com/owner/repo/issues/12`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidReference` when the token matches none of the
    /// accepted forms or the number is zero.
    pub fn parse(token: &str, default_repo: &RepoSlug) -> Result<Self> {
        let token = token.trim();

        if let Some(rest) = token
            .strip_prefix("https://github.com/")
            .or_else(|| token.strip_prefix("http://github.com/"))
        {
            let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
            if let [owner, name, "issues" | "pull", number] = parts.as_slice() {
                let repo: RepoSlug = format!("{owner}/{name}").parse()?;
                return Ok(Self::new(repo, parse_number(number, token)?));
            }
            return Err(Error::InvalidReference(format!(
                "'{token}' is not an issue URL"
            )));
        }

        if let Some((repo, number)) = token.split_once('#') {
            let repo = if repo.is_empty() {
                default_repo.clone()
            } else {
                repo.parse()?
            };
            return Ok(Self::new(repo, parse_number(number, token)?));
        }

        Ok(Self::new(default_repo.clone(), parse_number(token, token)?))
    }

    /// Parse a canonical `owner/repo#number` reference.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidReference` when the repository part is missing.
    pub fn parse_canonical(token: &str) -> Result<Self> {
        let token = token.trim();
        match token.split_once('#') {
            Some((repo, number)) if !repo.is_empty() => {
                Ok(Self::new(repo.parse()?, parse_number(number, token)?))
            }
            _ => Err(Error::InvalidReference(format!(
                "'{token}' must have the form owner/repo#number"
            ))),
        }
    }
}

fn parse_number(text: &str, token: &str) -> Result<ItemNumber> {
    match text.trim().parse::<ItemNumber>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidReference(format!(
            "'{token}' does not name an issue number"
        ))),
    }
}

impl TryFrom<String> for IssueRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse_canonical(&value)
    }
}

impl From<IssueRef> for String {
    fn from(r: IssueRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// Open/closed state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Item is open
    Open,

    /// Item has been closed
    Closed,
}

impl ItemState {
    /// Returns `true` for [`ItemState::Open`].
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for ItemState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(Error::UnexpectedResponse(format!(
                "unknown item state '{other}'"
            ))),
        }
    }
}

/// Type of work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Epic (top-level container)
    Epic,

    /// Feature (container below an epic)
    Feature,

    /// General task
    Task,

    /// Bug fix
    Bug,
}

impl ItemType {
    /// Position in the containment hierarchy; a child must rank strictly
    /// below its parent.
    pub fn rank(self) -> u8 {
        match self {
            Self::Epic => 3,
            Self::Feature => 2,
            Self::Task | Self::Bug => 1,
        }
    }

    /// Returns `true` for types expected to contain children.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Epic | Self::Feature)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epic => write!(f, "Epic"),
            Self::Feature => write!(f, "Feature"),
            Self::Task => write!(f, "Task"),
            Self::Bug => write!(f, "Bug"),
        }
    }
}

impl FromStr for ItemType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "feature" => Ok(Self::Feature),
            "task" => Ok(Self::Task),
            "bug" => Ok(Self::Bug),
            other => Err(Error::InvalidInput(format!(
                "unknown item type '{other}'. Valid types: Epic, Feature, Task, Bug"
            ))),
        }
    }
}

/// Label-derived priority.
///
/// The discriminant is the priority score used by the scheduler.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// No priority label
    #[default]
    None = 0,

    /// `low`
    Low = 1,

    /// `medium`
    Medium = 2,

    /// `high`
    High = 3,

    /// `critical`
    Critical = 4,
}

impl Priority {
    /// Numeric score (0-4).
    pub fn score(self) -> u8 {
        self as u8
    }

    /// Map a single label to a priority.
    ///
    /// Accepts `critical`, `high`, `medium`, `low`, optionally prefixed with
    /// `priority:`, `priority/` or `priority-`. Matching is case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        let lowered = label.trim().to_lowercase();
        let value = ["priority:", "priority/", "priority-"]
            .iter()
            .find_map(|prefix| lowered.strip_prefix(prefix))
            .unwrap_or(&lowered)
            .trim();

        match value {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Highest priority among `labels`, or [`Priority::None`].
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a String>) -> Self {
        labels
            .into_iter()
            .filter_map(|label| Self::from_label(label))
            .max()
            .unwrap_or_default()
    }
}

/// A node of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Issue number
    pub number: ItemNumber,

    /// Issue title
    pub title: String,

    /// Current state
    pub state: ItemState,

    /// Issue type, when the remote carries one of the known types
    pub item_type: Option<ItemType>,

    /// Label names
    pub labels: BTreeSet<String>,

    /// Assignee logins
    pub assignees: BTreeSet<String>,

    /// Raw body text (source of blocking edges)
    pub body: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Distance from the traversal root (0 = root)
    pub depth: usize,

    /// Structural parent within the traversal
    pub parent: Option<ItemNumber>,

    /// Tracking children actually fetched
    pub children: Vec<ItemNumber>,

    /// Number of children the remote reports, fetched or not
    pub child_total: usize,
}

impl WorkItem {
    /// Create an open, untyped item with no labels, timestamped now.
    pub fn new(number: ItemNumber, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            number,
            title: title.into(),
            state: ItemState::Open,
            item_type: None,
            labels: BTreeSet::new(),
            assignees: BTreeSet::new(),
            body: String::new(),
            created_at: now,
            updated_at: now,
            depth: 0,
            parent: None,
            children: Vec::new(),
            child_total: 0,
        }
    }

    /// Returns `true` if the item is open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Returns `true` if the item has no tracking children.
    ///
    /// An item whose children exist remotely but were not retrieved is not a
    /// leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.child_total == 0
    }

    /// Returns `true` if the remote reports children that are not in
    /// `children`.
    pub fn children_truncated(&self) -> bool {
        self.child_total > self.children.len()
    }

    /// Label-derived priority.
    pub fn priority(&self) -> Priority {
        Priority::from_labels(&self.labels)
    }
}

/// A child listed under a second parent during one traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConflict {
    /// The child item
    pub child: ItemNumber,

    /// Parent under which the child was first seen
    pub first_parent: ItemNumber,

    /// Parent that listed the child again
    pub second_parent: ItemNumber,
}

/// Depth-annotated items reachable from one root.
///
/// Built fresh for every operation and discarded afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMap {
    /// Repository the traversal ran in
    pub repo: RepoSlug,

    /// Traversal root
    pub root: ItemNumber,

    /// Items keyed by number
    pub nodes: BTreeMap<ItemNumber, WorkItem>,

    /// Tracking edges that would give a node a second parent
    pub conflicts: Vec<TrackingConflict>,
}

impl NodeMap {
    /// Create an empty map for a traversal rooted at `root`.
    pub fn new(repo: RepoSlug, root: ItemNumber) -> Self {
        Self {
            repo,
            root,
            nodes: BTreeMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Look up an item by number.
    pub fn get(&self, number: ItemNumber) -> Option<&WorkItem> {
        self.nodes.get(&number)
    }

    /// Returns `true` if `number` is in the map.
    pub fn contains(&self, number: ItemNumber) -> bool {
        self.nodes.contains_key(&number)
    }

    /// Insert (or replace) an item.
    pub fn insert(&mut self, item: WorkItem) {
        self.nodes.insert(item.number, item);
    }

    /// The root item, if it was fetched.
    pub fn root_item(&self) -> Option<&WorkItem> {
        self.nodes.get(&self.root)
    }

    /// Iterate items in number order.
    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.nodes.values()
    }

    /// Number of items in the map.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the map holds no items.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical reference for a local item number.
    pub fn reference(&self, number: ItemNumber) -> IssueRef {
        IssueRef::new(self.repo.clone(), number)
    }

    /// The in-map item a reference points at, if it is local and present.
    pub fn resolve(&self, reference: &IssueRef) -> Option<&WorkItem> {
        if reference.repo == self.repo {
            self.nodes.get(&reference.number)
        } else {
            None
        }
    }
}

/// Assignee criterion for readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssigneeFilter {
    /// Only items nobody is assigned to
    #[default]
    Unassigned,

    /// Any assignment state
    Any,

    /// Items assigned to this login
    User(String),
}

/// Filter applied to ready items
#[derive(Debug, Clone, Default)]
pub struct ReadyFilter {
    /// Assignee criterion (defaults to unassigned only)
    pub assignee: AssigneeFilter,

    /// Labels the item must all carry
    pub labels: Vec<String>,

    /// Required item type
    pub item_type: Option<ItemType>,
}

impl ReadyFilter {
    /// Returns `true` if `item` satisfies every criterion.
    pub fn matches(&self, item: &WorkItem) -> bool {
        let assignee_ok = match &self.assignee {
            AssigneeFilter::Unassigned => item.assignees.is_empty(),
            AssigneeFilter::Any => true,
            AssigneeFilter::User(login) => item
                .assignees
                .iter()
                .any(|a| a.eq_ignore_ascii_case(login)),
        };

        let labels_ok = self.labels.iter().all(|wanted| {
            item.labels
                .iter()
                .any(|label| label.eq_ignore_ascii_case(wanted))
        });

        let type_ok = self
            .item_type
            .is_none_or(|wanted| item.item_type == Some(wanted));

        assignee_ok && labels_ok && type_ok
    }
}

/// Output order of the ready list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadyOrder {
    /// Priority score descending
    #[default]
    Priority,

    /// Issue number ascending
    Number,

    /// Title ascending
    Title,
}

/// Strategy used to pick the next item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextStrategy {
    /// Deepest first
    Depth,

    /// Highest label priority first
    Labels,

    /// Oldest first
    Oldest,

    /// Depth, then label priority, then age
    #[default]
    Priority,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    #[rstest]
    #[case::bare("12", "acme/widgets#12")]
    #[case::hash("#12", "acme/widgets#12")]
    #[case::qualified("Other/Repo#7", "other/repo#7")]
    #[case::url("https://github.com/other/repo/issues/9", "other/repo#9")]
    #[case::pull_url("https://github.com/other/repo/pull/3/", "other/repo#3")]
    #[case::padded("  #5 ", "acme/widgets#5")]
    fn test_issue_ref_parse(#[case] token: &str, #[case] expected: &str) {
        let parsed = IssueRef::parse(token, &repo()).unwrap();
        assert_eq!(parsed.to_string(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::word("abc")]
    #[case::zero("#0")]
    #[case::negative("-3")]
    #[case::bad_repo("owner#3")]
    #[case::bad_url("https://github.com/owner/repo/wiki/3")]
    fn test_issue_ref_parse_invalid(#[case] token: &str) {
        assert!(IssueRef::parse(token, &repo()).is_err());
    }

    #[test]
    fn test_issue_ref_serde_roundtrip_uses_canonical_string() {
        let r = IssueRef::new(repo(), 42);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"acme/widgets#42\"");
        let back: IssueRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[rstest]
    #[case::plain("critical", Some(Priority::Critical))]
    #[case::prefixed("priority:high", Some(Priority::High))]
    #[case::slash("Priority/Medium", Some(Priority::Medium))]
    #[case::dash("priority-low", Some(Priority::Low))]
    #[case::spaced("priority: high", Some(Priority::High))]
    #[case::unrelated("bug", None)]
    fn test_priority_from_label(#[case] label: &str, #[case] expected: Option<Priority>) {
        assert_eq!(Priority::from_label(label), expected);
    }

    #[test]
    fn test_priority_highest_label_wins() {
        let labels: Vec<String> = vec!["low".into(), "critical".into(), "medium".into()];
        assert_eq!(Priority::from_labels(&labels), Priority::Critical);
        assert_eq!(Priority::from_labels(&Vec::<String>::new()), Priority::None);
        assert_eq!(Priority::Critical.score(), 4);
        assert_eq!(Priority::None.score(), 0);
    }

    #[test]
    fn test_item_type_rank_orders_hierarchy() {
        assert!(ItemType::Epic.rank() > ItemType::Feature.rank());
        assert!(ItemType::Feature.rank() > ItemType::Task.rank());
        assert_eq!(ItemType::Task.rank(), ItemType::Bug.rank());
        assert_eq!("EPIC".parse::<ItemType>().unwrap(), ItemType::Epic);
        assert!("story".parse::<ItemType>().is_err());
    }
}
