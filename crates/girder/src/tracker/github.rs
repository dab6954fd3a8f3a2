//! GitHub Issues backend over the GraphQL API.

use super::{IssueTracker, ItemStatus, NewItem, TrackedItem};
use crate::domain::{IssueRef, ItemNumber, ItemState, RepoSlug, WorkItem};
use crate::error::{Error, Result};
use crate::remote::{RemoteClient, RemoteError, Request, SendOptions, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Children returned per expansion; `subIssuesSummary.total` reports the rest.
const CHILD_PAGE_SIZE: u32 = 100;

const ITEM_FIELDS: &str = "
fragment ItemFields on Issue {
  number
  title
  state
  body
  createdAt
  updatedAt
  issueType { name }
  labels(first: 50) { nodes { name } }
  assignees(first: 20) { nodes { login } }
  subIssuesSummary { total }
}";

const FETCH_ITEM_QUERY: &str = "
query($owner: String!, $name: String!, $number: Int!, $first: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      ...ItemFields
      subIssues(first: $first) { nodes { ...ItemFields } }
    }
  }
}";

const FETCH_STATE_QUERY: &str = "
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) { title state }
  }
}";

const ISSUE_ID_QUERY: &str = "
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) { id }
  }
}";

const REPOSITORY_QUERY: &str = "
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    issueTypes(first: 25) { nodes { id name } }
    labels(first: 100) { nodes { id name } }
  }
}";

const UPDATE_BODY_MUTATION: &str = "
mutation($id: ID!, $body: String!) {
  updateIssue(input: { id: $id, body: $body }) { issue { number } }
}";

const CREATE_ITEM_MUTATION: &str = "
mutation($input: CreateIssueInput!) {
  createIssue(input: $input) { issue { number } }
}";

const ADD_SUB_ISSUE_MUTATION: &str = "
mutation($parent: ID!, $child: ID!) {
  addSubIssue(input: { issueId: $parent, subIssueId: $child }) { issue { number } }
}";

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Nodes<T> {
    #[serde(default)]
    nodes: Vec<Option<T>>,
}

impl<T> Nodes<T> {
    fn into_vec(self) -> Vec<T> {
        self.nodes.into_iter().flatten().collect()
    }
}

#[derive(Deserialize)]
struct RawName {
    name: String,
}

#[derive(Deserialize)]
struct RawLogin {
    login: String,
}

#[derive(Deserialize)]
struct RawSummary {
    total: usize,
}

#[derive(Deserialize)]
struct RawNamedId {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    number: ItemNumber,
    title: String,
    state: String,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    issue_type: Option<RawName>,
    #[serde(default)]
    labels: Option<Nodes<RawName>>,
    #[serde(default)]
    assignees: Option<Nodes<RawLogin>>,
    #[serde(default)]
    sub_issues_summary: Option<RawSummary>,
    #[serde(default)]
    sub_issues: Option<Nodes<RawIssue>>,
}

impl RawIssue {
    fn into_tracked(mut self) -> Result<TrackedItem> {
        let children = self
            .sub_issues
            .take()
            .map(Nodes::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(RawIssue::into_work_item)
            .collect::<Result<Vec<_>>>()?;
        let mut item = self.into_work_item()?;
        item.child_total = item.child_total.max(children.len());
        Ok(TrackedItem { item, children })
    }

    fn into_work_item(self) -> Result<WorkItem> {
        let state: ItemState = self.state.parse()?;
        // Organization-defined types outside the known set are left untyped.
        let item_type = self.issue_type.and_then(|t| t.name.parse().ok());

        Ok(WorkItem {
            number: self.number,
            title: self.title,
            state,
            item_type,
            labels: self
                .labels
                .map(Nodes::into_vec)
                .unwrap_or_default()
                .into_iter()
                .map(|l| l.name)
                .collect(),
            assignees: self
                .assignees
                .map(Nodes::into_vec)
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.login)
                .collect(),
            body: self.body.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            depth: 0,
            parent: None,
            children: Vec::new(),
            child_total: self.sub_issues_summary.map_or(0, |s| s.total),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    id: String,
    #[serde(default)]
    issue_types: Option<Nodes<RawNamedId>>,
    #[serde(default)]
    labels: Option<Nodes<RawNamedId>>,
}

fn decode<T: DeserializeOwned>(data: &Value, pointer: &str) -> Result<Option<T>> {
    match data.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| Error::UnexpectedResponse(format!("{pointer}: {e}"))),
    }
}

fn issue_variables(request: Request, reference: &IssueRef) -> Request {
    request
        .var("owner", reference.repo.owner())
        .var("name", reference.repo.name())
        .var("number", reference.number)
}

fn lift_remote(err: RemoteError, reference: &IssueRef) -> Error {
    if err.is_not_found() {
        Error::NotFound(reference.clone())
    } else {
        Error::Remote(err)
    }
}

/// [`IssueTracker`] backed by GitHub's GraphQL API.
///
/// Reads always hit the network. With dry-run enabled, mutations are
/// logged and skipped; item creation is refused because no number can be
/// produced without the remote.
#[derive(Debug)]
pub struct GithubTracker<T> {
    client: RemoteClient<T>,
    dry_run: bool,
}

impl<T: Transport> GithubTracker<T> {
    /// Create a tracker over `client`.
    pub fn new(client: RemoteClient<T>) -> Self {
        Self {
            client,
            dry_run: false,
        }
    }

    /// Enable or disable dry-run for mutations.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The underlying remote client.
    pub fn client(&self) -> &RemoteClient<T> {
        &self.client
    }

    async fn query(
        &self,
        request: &Request,
        correlation_id: String,
    ) -> std::result::Result<Value, RemoteError> {
        let options = SendOptions {
            dry_run: false,
            correlation_id: Some(correlation_id),
        };
        Ok(self.client.send(request, &options).await?.data)
    }

    /// Send a mutation; `None` when dry-run skipped it.
    async fn mutate(
        &self,
        request: &Request,
        correlation_id: String,
    ) -> std::result::Result<Option<Value>, RemoteError> {
        let options = SendOptions {
            dry_run: self.dry_run,
            correlation_id: Some(correlation_id),
        };
        let response = self.client.send(request, &options).await?;
        if response.dry_run {
            tracing::info!(request = %response.data, "Dry run: mutation not sent");
            return Ok(None);
        }
        Ok(Some(response.data))
    }

    async fn issue_id(&self, reference: &IssueRef) -> Result<String> {
        let request = issue_variables(Request::new(ISSUE_ID_QUERY), reference);
        let data = self
            .query(&request, format!("id:{reference}"))
            .await
            .map_err(|e| lift_remote(e, reference))?;
        decode(&data, "/repository/issue/id")?.ok_or_else(|| Error::NotFound(reference.clone()))
    }
}

#[async_trait]
impl<T: Transport> IssueTracker for GithubTracker<T> {
    async fn fetch_item(&self, reference: &IssueRef) -> Result<TrackedItem> {
        let query = format!("{FETCH_ITEM_QUERY}\n{ITEM_FIELDS}");
        let request = issue_variables(Request::new(query), reference).var("first", CHILD_PAGE_SIZE);
        let data = self
            .query(&request, format!("fetch:{reference}"))
            .await
            .map_err(|e| lift_remote(e, reference))?;

        let raw: RawIssue = decode(&data, "/repository/issue")?
            .ok_or_else(|| Error::NotFound(reference.clone()))?;
        let tracked = raw.into_tracked()?;

        tracing::debug!(
            item = %reference,
            children = tracked.children.len(),
            child_total = tracked.item.child_total,
            "Fetched item"
        );
        Ok(tracked)
    }

    async fn fetch_state(&self, reference: &IssueRef) -> Result<ItemStatus> {
        #[derive(Deserialize)]
        struct RawStatus {
            title: String,
            state: String,
        }

        let request = issue_variables(Request::new(FETCH_STATE_QUERY), reference);
        let data = self
            .query(&request, format!("state:{reference}"))
            .await
            .map_err(|e| lift_remote(e, reference))?;

        let raw: RawStatus = decode(&data, "/repository/issue")?
            .ok_or_else(|| Error::NotFound(reference.clone()))?;
        Ok(ItemStatus {
            title: raw.title,
            state: raw.state.parse()?,
        })
    }

    async fn update_body(&self, reference: &IssueRef, body: &str) -> Result<()> {
        let id = self.issue_id(reference).await?;
        let request = Request::new(UPDATE_BODY_MUTATION)
            .var("id", id)
            .var("body", body);

        if self
            .mutate(&request, format!("update:{reference}"))
            .await
            .map_err(|e| lift_remote(e, reference))?
            .is_some()
        {
            tracing::info!(item = %reference, "Updated item body");
        }
        Ok(())
    }

    async fn create_item(&self, repo: &RepoSlug, item: &NewItem) -> Result<ItemNumber> {
        if self.dry_run {
            return Err(Error::InvalidInput(
                "items cannot be created in dry-run mode".to_string(),
            ));
        }

        let request = Request::new(REPOSITORY_QUERY)
            .var("owner", repo.owner())
            .var("name", repo.name());
        let data = self.query(&request, format!("repo:{repo}")).await?;
        let repository: RawRepository = decode(&data, "/repository")?
            .ok_or_else(|| Error::InvalidInput(format!("repository '{repo}' not found")))?;

        let mut input = json!({
            "repositoryId": repository.id,
            "title": item.title,
            "body": item.body,
        });

        if let Some(item_type) = item.item_type {
            let wanted = item_type.to_string();
            match repository
                .issue_types
                .map(Nodes::into_vec)
                .unwrap_or_default()
                .into_iter()
                .find(|t| t.name.eq_ignore_ascii_case(&wanted))
            {
                Some(t) => input["issueTypeId"] = Value::String(t.id),
                None => tracing::warn!(
                    repo = %repo,
                    item_type = %wanted,
                    "Issue type not available in repository"
                ),
            }
        }

        if !item.labels.is_empty() {
            let available = repository.labels.map(Nodes::into_vec).unwrap_or_default();
            let mut label_ids = Vec::new();
            for wanted in &item.labels {
                match available.iter().find(|l| l.name.eq_ignore_ascii_case(wanted)) {
                    Some(label) => label_ids.push(Value::String(label.id.clone())),
                    None => {
                        tracing::warn!(repo = %repo, label = %wanted, "Label not found, skipping");
                    }
                }
            }
            input["labelIds"] = Value::Array(label_ids);
        }

        let request = Request::new(CREATE_ITEM_MUTATION).var("input", input);
        let data = self
            .mutate(&request, format!("create:{repo}"))
            .await?
            .ok_or_else(|| {
                Error::InvalidInput("items cannot be created in dry-run mode".to_string())
            })?;

        let number: ItemNumber = decode(&data, "/createIssue/issue/number")?.ok_or_else(|| {
            Error::UnexpectedResponse("createIssue returned no issue number".to_string())
        })?;
        tracing::info!(repo = %repo, number, title = %item.title, "Created item");
        Ok(number)
    }

    async fn link_child(&self, parent: &IssueRef, child: &IssueRef) -> Result<()> {
        let parent_id = self.issue_id(parent).await?;
        let child_id = self.issue_id(child).await?;
        let request = Request::new(ADD_SUB_ISSUE_MUTATION)
            .var("parent", parent_id)
            .var("child", child_id);

        if self
            .mutate(&request, format!("link:{parent}->{child}"))
            .await?
            .is_some()
        {
            tracing::info!(parent = %parent, child = %child, "Linked child item");
        }
        Ok(())
    }
}
