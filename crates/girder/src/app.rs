//! Application context for CLI command execution.
//!
//! [`App`] resolves configuration, the default repository and the remote
//! tracker once, so every command runs against the same context.

use crate::config::GirderConfig;
use crate::domain::{IssueRef, RepoSlug};
use crate::error::{Error, Result};
use crate::fetch::FetchOptions;
use crate::health::HealthOptions;
use crate::remote::{HttpTransport, RemoteClient};
use crate::tracker::{GithubTracker, IssueTracker};
use std::path::Path;

/// Overrides taken from global command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Explicit config file instead of discovery
    pub config: Option<std::path::PathBuf>,

    /// Repository for bare `#N` references
    pub repository: Option<RepoSlug>,

    /// Skip remote mutations
    pub dry_run: bool,
}

/// Application context for CLI operations.
pub struct App {
    config: GirderConfig,
    tracker: Box<dyn IssueTracker>,
    dry_run: bool,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("dry_run", &self.dry_run)
            .field("tracker", &"<dyn IssueTracker>")
            .finish()
    }
}

impl App {
    /// Build the context for `working_dir` with the GitHub tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or no API
    /// token is available.
    pub async fn from_directory(working_dir: &Path, overrides: Overrides) -> Result<Self> {
        let config = match &overrides.config {
            Some(path) => GirderConfig::load(path).await?,
            None => GirderConfig::discover(working_dir).await?,
        };

        let transport = HttpTransport::new(config.endpoint.clone(), config.token()?)?;
        let client = RemoteClient::new(transport).with_retry(config.retry_config());
        let tracker = GithubTracker::new(client).with_dry_run(overrides.dry_run);

        Ok(Self::with_tracker(config, Box::new(tracker), overrides))
    }

    /// Build a context around an existing tracker.
    pub fn with_tracker(
        mut config: GirderConfig,
        tracker: Box<dyn IssueTracker>,
        overrides: Overrides,
    ) -> Self {
        if overrides.repository.is_some() {
            config.repository = overrides.repository;
        }
        Self {
            config,
            tracker,
            dry_run: overrides.dry_run,
        }
    }

    /// The effective configuration.
    pub fn config(&self) -> &GirderConfig {
        &self.config
    }

    /// The remote tracker.
    pub fn tracker(&self) -> &dyn IssueTracker {
        self.tracker.as_ref()
    }

    /// Whether mutations are skipped.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// The repository bare references resolve against.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when no repository is configured.
    pub fn repository(&self) -> Result<&RepoSlug> {
        self.config.repository.as_ref().ok_or_else(|| {
            Error::Config("no repository configured; pass --repo or set `repository`".into())
        })
    }

    /// Parse an item reference given on the command line.
    ///
    /// Fully qualified references work without a configured repository.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidReference` for a malformed token and
    /// `Error::Config` for a bare reference with no repository configured.
    pub fn parse_ref(&self, token: &str) -> Result<IssueRef> {
        match &self.config.repository {
            Some(repo) => IssueRef::parse(token, repo),
            None if token.contains('#') && !token.starts_with('#') => {
                IssueRef::parse_canonical(token)
            }
            None => IssueRef::parse(token, self.repository()?),
        }
    }

    /// Traversal limits from the configuration.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_depth: self.config.max_depth,
            concurrency: self.config.concurrency,
        }
    }

    /// Health settings from the configuration.
    pub fn health_options(&self) -> HealthOptions {
        HealthOptions {
            stale_after: chrono::Duration::days(self.config.stale_days),
            ..HealthOptions::default()
        }
    }
}
