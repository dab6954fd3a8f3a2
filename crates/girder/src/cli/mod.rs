//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `ready`: list items under a root that can be started now
//! - `next`: pick the single best item to work on
//! - `deps`: record blocking edges on both endpoints
//! - `validate`: report cycles, conflicts and advisory problems
//! - `import`: create a hierarchy from a YAML or JSON graph file
//!
//! # Global Flags
//!
//! - `--config`: explicit config file instead of `.girder/config.yaml`
//! - `--repo`: repository for bare `#N` references
//! - `--dry-run`: skip every remote mutation
//!
//! # Example
//!
//! ```bash
//! girder --repo acme/widgets ready 12 --label backend
//! girder next acme/widgets#12 --strategy oldest
//! girder deps '#31' --depends-on '#29,#30' --wave 2
//! girder --dry-run import plan.yaml
//! ```

mod args;
mod execute;
mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{DepsArgs, ImportArgs, NextArgs, ReadyArgs, ValidateArgs};
pub use types::{ItemTypeArg, NextStrategyArg, ReadyOrderArg};

use crate::app::{App, Overrides};
use crate::domain::RepoSlug;

/// Girder - dependency graphs over GitHub issue hierarchies
///
/// Reads sub-issue trees and "Blocked by" sections to tell you what can be
/// worked on next.
#[derive(Parser, Debug)]
#[command(name = "girder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file to use instead of discovering `.girder/config.yaml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository for bare `#N` references (overrides the config file)
    #[arg(long, global = true)]
    pub repo: Option<RepoSlug>,

    /// Compute everything but skip remote mutations
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show items ready to work on
    ///
    /// Fetches the hierarchy below ROOT and lists open leaves whose blockers
    /// are all closed. Unassigned items only, unless --any or --assignee.
    Ready(ReadyArgs),

    /// Pick the next item to work on
    Next(NextArgs),

    /// Record blocking dependencies
    ///
    /// Updates the item's "## Dependencies" section and adds the inverse
    /// relation on every referenced item.
    Deps(DepsArgs),

    /// Check the hierarchy for structural problems
    Validate(ValidateArgs),

    /// Create items and links from a graph file
    Import(ImportArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            repository: self.repo.clone(),
            dry_run: self.dry_run,
        }
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the
    /// command fails.
    pub async fn execute(&self) -> Result<()> {
        let app = App::from_directory(&std::env::current_dir()?, self.overrides()).await?;
        self.execute_with(&app).await
    }

    /// Execute the CLI command against an existing context
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn execute_with(&self, app: &App) -> Result<()> {
        match &self.command {
            Commands::Ready(args) => execute::execute_ready(app, args).await,
            Commands::Next(args) => execute::execute_next(app, args).await,
            Commands::Deps(args) => execute::execute_deps(app, args).await,
            Commands::Validate(args) => execute::execute_validate(app, args).await,
            Commands::Import(args) => execute::execute_import(app, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "girder",
            "ready",
            "12",
            "--repo",
            "Acme/Widgets",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.dry_run);
        assert_eq!(cli.repo, Some(RepoSlug::new("acme", "widgets")));
        assert!(matches!(cli.command, Commands::Ready(_)));
    }

    #[test]
    fn test_parse_ready_filters() {
        let cli = Cli::try_parse_from([
            "girder", "ready", "#1", "--label", "a,b", "--type", "bug", "--order", "title",
        ])
        .unwrap();

        match cli.command {
            Commands::Ready(args) => {
                assert_eq!(args.label, vec!["a", "b"]);
                assert_eq!(args.item_type, Some(ItemTypeArg::Bug));
                assert_eq!(args.order, ReadyOrderArg::Title);
                assert!(!args.any);
            }
            other => panic!("Expected Ready command, got {other:?}"),
        }
    }

    #[test]
    fn test_assignee_conflicts_with_any() {
        let args = ["girder", "ready", "1", "--any", "--assignee", "bob"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_next_default_strategy() {
        let cli = Cli::try_parse_from(["girder", "next", "acme/widgets#4"]).unwrap();

        match cli.command {
            Commands::Next(args) => assert_eq!(args.strategy, NextStrategyArg::Priority),
            other => panic!("Expected Next command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_next_filters() {
        let cli = Cli::try_parse_from([
            "girder", "next", "#4", "--label", "backend", "--type", "task", "--any",
        ])
        .unwrap();

        match cli.command {
            Commands::Next(args) => {
                assert_eq!(args.label, vec!["backend"]);
                assert_eq!(args.item_type, Some(ItemTypeArg::Task));
                assert!(args.any);
                assert_eq!(args.assignee, None);
            }
            other => panic!("Expected Next command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_deps_lists() {
        let cli = Cli::try_parse_from([
            "girder",
            "deps",
            "#31",
            "--depends-on",
            "#29,#30",
            "--blocks",
            "other/repo#2",
            "--wave",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Deps(args) => {
                assert_eq!(args.depends_on, vec!["#29", "#30"]);
                assert_eq!(args.blocks, vec!["other/repo#2"]);
                assert_eq!(args.wave, Some(2));
            }
            other => panic!("Expected Deps command, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_repo() {
        assert!(Cli::try_parse_from(["girder", "--repo", "nope", "validate", "1"]).is_err());
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["girder"]).is_err());
    }
}
