//! Materializing a declarative graph spec into tracker items.
//!
//! A spec lists nodes (local id, title, type, optional body and labels) and
//! tracking edges `from -> to` meaning "`to` is a child of `from`". Nothing
//! is created unless the graph spec validates and its edges sort topologically;
//! items are then created parents first and linked once all exist.
//!
//! ```yaml
//! nodes:
//!   - id: e1
//!     title: Checkout redesign
//!     type: Epic
//!   - id: t1
//!     title: Build payment form
//!     type: Task
//! edges:
//!   - from: e1
//!     to: t1
//! ```

use crate::domain::{IssueRef, ItemType, RepoSlug};
use crate::error::Result;
use crate::graph::topological_sort;
use crate::tracker::{IssueTracker, NewItem};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One node of a graph spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Local identifier, unique within the graph spec
    #[serde(default)]
    pub id: String,

    /// Item title
    #[serde(default)]
    pub title: String,

    /// Item type name (`Epic`, `Feature`, `Task` or `Bug`)
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,

    /// Optional item body
    #[serde(default)]
    pub body: Option<String>,

    /// Label names
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A tracking edge: `to` becomes a child of `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Parent id
    pub from: String,

    /// Child id
    pub to: String,
}

/// Declarative description of items to create and link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Nodes to create
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Tracking edges to establish
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// Structural problem in a graph spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphSpecError {
    /// A node has an empty id.
    #[error("node at position {index} has an empty id")]
    EmptyId {
        /// Position of the node in the graph spec
        index: usize,
    },

    /// Two nodes share an id.
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// A required field is missing or blank.
    #[error("node '{id}' is missing required field '{field}'")]
    MissingField {
        /// Node id
        id: String,
        /// Field name
        field: &'static str,
    },

    /// A node names a type outside the known set.
    #[error("node '{id}' has unknown type '{value}'. Valid types: Epic, Feature, Task, Bug")]
    UnknownType {
        /// Node id
        id: String,
        /// The offending type name
        value: String,
    },

    /// An edge names a node the graph spec does not declare.
    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    UnknownEndpoint {
        /// Edge parent id
        from: String,
        /// Edge child id
        to: String,
        /// The undeclared id
        missing: String,
    },

    /// The same edge is listed twice.
    #[error("edge {from} -> {to} is listed more than once")]
    DuplicateEdge {
        /// Edge parent id
        from: String,
        /// Edge child id
        to: String,
    },

    /// A node is the child of two parents; tracking edges must form a tree.
    #[error("node '{child}' has two parents: '{first}' and '{second}'")]
    MultipleParents {
        /// Child id
        child: String,
        /// Parent from the first edge naming the child
        first: String,
        /// Parent from the later edge
        second: String,
    },
}

impl NodeSpec {
    fn parsed_type(&self) -> std::result::Result<ItemType, GraphSpecError> {
        let Some(value) = self.item_type.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Err(GraphSpecError::MissingField {
                id: self.id.clone(),
                field: "type",
            });
        };
        value.parse().map_err(|_| GraphSpecError::UnknownType {
            id: self.id.clone(),
            value: value.to_string(),
        })
    }
}

impl GraphSpec {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Yaml` on malformed input.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` on malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a spec file; `.json` files are parsed as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and a parse error if
    /// it is malformed.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Check ids, required fields, types, edge endpoints and that every
    /// node has at most one parent.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphSpecError`] found, in node order and then
    /// edge order.
    pub fn validate(&self) -> std::result::Result<(), GraphSpecError> {
        let mut ids = HashSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                return Err(GraphSpecError::EmptyId { index });
            }
            if !ids.insert(node.id.as_str()) {
                return Err(GraphSpecError::DuplicateId(node.id.clone()));
            }
            if node.title.trim().is_empty() {
                return Err(GraphSpecError::MissingField {
                    id: node.id.clone(),
                    field: "title",
                });
            }
            node.parsed_type()?;
        }

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphSpecError::UnknownEndpoint {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        for edge in &self.edges {
            match parents.get(edge.to.as_str()) {
                Some(&first) if first == edge.from => {
                    return Err(GraphSpecError::DuplicateEdge {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                    });
                }
                Some(&first) => {
                    return Err(GraphSpecError::MultipleParents {
                        child: edge.to.clone(),
                        first: first.to_string(),
                        second: edge.from.clone(),
                    });
                }
                None => {
                    parents.insert(edge.to.as_str(), edge.from.as_str());
                }
            }
        }
        Ok(())
    }

    /// Node ids in creation order (every parent before its children).
    ///
    /// # Errors
    ///
    /// Returns `Error::GraphSpec` for an invalid spec and `Error::Cycle`
    /// with the full cycle path when the edges are cyclic.
    pub fn creation_order(&self) -> Result<Vec<String>> {
        self.validate()?;
        let ids: Vec<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let edges: Vec<(String, String)> = self
            .edges
            .iter()
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();
        Ok(topological_sort(&ids, &edges)?)
    }
}

/// One created item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedItem {
    /// Local id from the graph spec
    pub id: String,

    /// Reference of the created item
    pub reference: IssueRef,
}

/// Result of [`materialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    /// Creation order of local ids
    pub order: Vec<String>,

    /// Items created, in creation order (empty on a dry run)
    pub created: Vec<CreatedItem>,

    /// Tracking edges linked
    pub linked: usize,

    /// Whether this was a dry run
    pub dry_run: bool,
}

/// Create and link the items of `spec` in `repo`.
///
/// With `dry_run`, only the creation order is computed.
///
/// # Errors
///
/// Returns `Error::GraphSpec` or `Error::Cycle` before any creation when the
/// spec is invalid or cyclic, and the tracker's error if a creation or link
/// fails part way.
pub async fn materialize(
    tracker: &dyn IssueTracker,
    repo: &RepoSlug,
    spec: &GraphSpec,
    dry_run: bool,
) -> Result<MaterializeReport> {
    let order = spec.creation_order()?;

    if dry_run {
        tracing::info!(nodes = order.len(), edges = spec.edges.len(), "Dry run: nothing created");
        return Ok(MaterializeReport {
            order,
            dry_run: true,
            ..MaterializeReport::default()
        });
    }

    let mut created: Vec<CreatedItem> = Vec::with_capacity(order.len());
    for id in &order {
        let Some(node) = spec.nodes.iter().find(|n| &n.id == id) else {
            continue;
        };
        let new_item = NewItem {
            title: node.title.clone(),
            body: node.body.clone().unwrap_or_default(),
            item_type: Some(node.parsed_type()?),
            labels: node.labels.clone(),
        };
        let number = tracker.create_item(repo, &new_item).await?;
        let reference = IssueRef::new(repo.clone(), number);
        tracing::info!(id = %id, item = %reference, "Created item from spec");
        created.push(CreatedItem {
            id: id.clone(),
            reference,
        });
    }

    let lookup = |id: &str| {
        created
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.reference.clone())
    };

    let mut linked = 0;
    for edge in &spec.edges {
        let (Some(parent), Some(child)) = (lookup(&edge.from), lookup(&edge.to)) else {
            continue;
        };
        tracker.link_child(&parent, &child).await?;
        linked += 1;
    }

    Ok(MaterializeReport {
        order,
        created,
        linked,
        dry_run: false,
    })
}
