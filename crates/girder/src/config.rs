//! Configuration loading.
//!
//! Settings live in `.girder/config.yaml`, found by walking up from the
//! working directory. A missing file yields [`GirderConfig::default`];
//! command-line flags override whatever the file says.
//!
//! ```yaml
//! repository: acme/widgets
//! endpoint: https://api.github.com/graphql
//! token-env: GITHUB_TOKEN
//! max-depth: 3
//! concurrency: 4
//! stale-days: 30
//! retry:
//!   max-retries: 3
//!   initial-delay-ms: 1000
//!   max-delay-ms: 60000
//! ```

use crate::domain::RepoSlug;
use crate::error::{Error, Result};
use crate::fetch::{DEFAULT_CONCURRENCY, MAX_DEPTH};
use crate::health::DEFAULT_STALE_DAYS;
use crate::remote::{DEFAULT_ENDPOINT, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Name of the girder directory
pub const GIRDER_DIR_NAME: &str = ".girder";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable holding the API token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Maximum directory depth to traverse when searching for the girder root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Retry section of the configuration file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetrySettings {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct GirderConfig {
    /// Repository used for bare `#N` references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepoSlug>,

    /// GraphQL endpoint
    pub endpoint: String,

    /// Environment variable holding the API token
    pub token_env: String,

    /// Tracking depth for graph fetches (1 to 3)
    pub max_depth: usize,

    /// Bound for concurrent remote calls
    pub concurrency: usize,

    /// Days without update after which an open item is stale
    pub stale_days: i64,

    /// Retry policy for remote calls
    pub retry: RetrySettings,
}

impl Default for GirderConfig {
    fn default() -> Self {
        Self {
            repository: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            max_depth: MAX_DEPTH,
            concurrency: DEFAULT_CONCURRENCY,
            stale_days: DEFAULT_STALE_DAYS,
            retry: RetrySettings::default(),
        }
    }
}

impl GirderConfig {
    /// Parse configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid YAML for this
    /// structure or fails [`validate`](Self::validate).
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config`
    /// if its contents are invalid.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Self::from_yaml(&content)
    }

    /// Load the configuration that applies to `start_dir`.
    ///
    /// Returns defaults when no `.girder/` directory is found above it or
    /// the directory holds no config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the config file exists but cannot be read and
    /// `Error::Config` if its contents are invalid.
    pub async fn discover(start_dir: &Path) -> Result<Self> {
        let Some(root) = find_girder_root(start_dir) else {
            tracing::debug!(
                start = %start_dir.display(),
                "No girder directory found, using defaults"
            );
            return Ok(Self::default());
        };

        let path = root.join(GIRDER_DIR_NAME).join(CONFIG_FILE_NAME);
        if !fs::try_exists(&path).await? {
            return Ok(Self::default());
        }

        tracing::debug!(path = %path.display(), "Loading configuration");
        Self::load(&path).await
    }

    /// Reject values no command can work with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first out-of-range setting.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if !(1..=MAX_DEPTH).contains(&self.max_depth) {
            return Err(Error::Config(format!(
                "max-depth must be between 1 and {MAX_DEPTH}"
            )));
        }
        if self.stale_days < 1 {
            return Err(Error::Config("stale-days must be positive".into()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(
                "retry initial-delay-ms cannot exceed max-delay-ms".into(),
            ));
        }
        Ok(())
    }

    /// Retry policy for the remote client.
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.into()
    }

    /// Read the API token from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the variable is unset or blank.
    pub fn token(&self) -> Result<String> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(Error::Config(format!(
                "no API token found in ${}",
                self.token_env
            ))),
        }
    }
}

/// Find the girder root directory by searching up the directory tree.
///
/// Returns the directory containing `.girder/`, or `None` if none is found
/// within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_girder_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(GIRDER_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
