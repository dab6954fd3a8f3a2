//! Command execution logic.
//!
//! Every command prints one JSON document on stdout.

use anyhow::{Result, bail};
use serde::Serialize;

use super::args::{DepsArgs, ImportArgs, NextArgs, ReadyArgs, ValidateArgs};
use crate::app::App;
use crate::deps::{DependencyRequest, ResolutionWarning, set_dependency};
use super::types::ItemTypeArg;
use crate::domain::{AssigneeFilter, ReadyFilter, ReadyOrder, WorkItem};
use crate::fetch::fetch_graph;
use crate::health::check_health;
use crate::materialize::{GraphSpec, materialize};
use crate::output;
use crate::ready::resolve_ready;
use crate::schedule::select_next;

/// Output of the `next` command.
#[derive(Debug, Serialize)]
struct NextOutput {
    /// Selected item, if any item is ready
    item: Option<WorkItem>,

    /// Number of ready candidates
    candidates: usize,

    /// Blocking references that could not be resolved
    warnings: Vec<ResolutionWarning>,
}

fn report_warnings(warnings: &[ResolutionWarning]) {
    for warning in warnings {
        tracing::warn!(
            reference = %warning.reference,
            kind = ?warning.kind,
            "Could not resolve blocker: {}",
            warning.message
        );
    }
}

fn ready_filter(
    assignee: Option<&str>,
    any: bool,
    labels: &[String],
    item_type: Option<ItemTypeArg>,
) -> ReadyFilter {
    let assignee = match (assignee, any) {
        (Some(login), _) => AssigneeFilter::User(login.to_string()),
        (None, true) => AssigneeFilter::Any,
        (None, false) => AssigneeFilter::Unassigned,
    };
    ReadyFilter {
        assignee,
        labels: labels.to_vec(),
        item_type: item_type.map(Into::into),
    }
}

/// Execute the ready command
pub async fn execute_ready(app: &App, args: &ReadyArgs) -> Result<()> {
    let root = app.parse_ref(&args.root)?;
    let map = fetch_graph(app.tracker(), &root, &app.fetch_options()).await?;

    let filter = ready_filter(
        args.assignee.as_deref(),
        args.any,
        &args.label,
        args.item_type,
    );
    let mut report = resolve_ready(app.tracker(), &map, &filter, args.order.into()).await;
    report_warnings(&report.warnings);

    if let Some(limit) = args.limit {
        report.items.truncate(limit);
    }

    output::print_json(&report)?;
    Ok(())
}

/// Execute the next command
pub async fn execute_next(app: &App, args: &NextArgs) -> Result<()> {
    let root = app.parse_ref(&args.root)?;
    let map = fetch_graph(app.tracker(), &root, &app.fetch_options()).await?;

    let filter = ready_filter(
        args.assignee.as_deref(),
        args.any,
        &args.label,
        args.item_type,
    );
    let report = resolve_ready(app.tracker(), &map, &filter, ReadyOrder::Number).await;
    report_warnings(&report.warnings);

    let item = select_next(&report.items, args.strategy.into()).cloned();
    match &item {
        Some(item) => {
            tracing::info!(item = item.number, strategy = ?args.strategy, "Selected next item");
        }
        None => tracing::info!(root = %root, "No ready items"),
    }

    output::print_json(&NextOutput {
        item,
        candidates: report.items.len(),
        warnings: report.warnings,
    })?;
    Ok(())
}

/// Execute the deps command
pub async fn execute_deps(app: &App, args: &DepsArgs) -> Result<()> {
    if args.depends_on.is_empty() && args.blocks.is_empty() && args.wave.is_none() {
        bail!("nothing to record: pass --depends-on, --blocks or --wave");
    }

    let mut request = DependencyRequest::new(app.parse_ref(&args.item)?);
    request.depends_on = args
        .depends_on
        .iter()
        .map(|token| app.parse_ref(token))
        .collect::<crate::Result<_>>()?;
    request.blocks = args
        .blocks
        .iter()
        .map(|token| app.parse_ref(token))
        .collect::<crate::Result<_>>()?;
    request.wave = args.wave;
    request.concurrency = app.config().concurrency;

    let update = set_dependency(app.tracker(), &request).await?;
    for failed in &update.cross_refs_failed {
        tracing::warn!(reference = %failed, "Inverse relation not recorded");
    }

    output::print_json(&update)?;
    Ok(())
}

/// Execute the validate command
pub async fn execute_validate(app: &App, args: &ValidateArgs) -> Result<()> {
    let root = app.parse_ref(&args.root)?;
    let map = fetch_graph(app.tracker(), &root, &app.fetch_options()).await?;

    let report = check_health(app.tracker(), &map, &app.health_options()).await;
    output::print_json(&report)?;

    if args.strict && !report.is_healthy() {
        bail!("{} structural error(s) found", report.errors.len());
    }
    Ok(())
}

/// Execute the import command
pub async fn execute_import(app: &App, args: &ImportArgs) -> Result<()> {
    let spec = GraphSpec::load(&args.file).await?;
    let repo = app.repository()?;

    let report = materialize(app.tracker(), repo, &spec, app.dry_run()).await?;

    output::print_json(&report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemType;
    use rstest::rstest;

    #[rstest]
    #[case::default(None, false, AssigneeFilter::Unassigned)]
    #[case::any(None, true, AssigneeFilter::Any)]
    #[case::user(Some("alice"), false, AssigneeFilter::User("alice".into()))]
    fn test_ready_filter(
        #[case] assignee: Option<&str>,
        #[case] any: bool,
        #[case] expected: AssigneeFilter,
    ) {
        let filter = ready_filter(assignee, any, &["backend".to_string()], None);

        assert_eq!(filter.assignee, expected);
        assert_eq!(filter.labels, vec!["backend".to_string()]);
        assert_eq!(filter.item_type, None);
    }

    #[test]
    fn test_ready_filter_type() {
        let filter = ready_filter(None, true, &[], Some(ItemTypeArg::Bug));
        assert_eq!(filter.item_type, Some(ItemType::Bug));
    }
}
