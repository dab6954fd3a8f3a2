//! Error types for girder operations.
//!
//! Advisory findings (stale items, asymmetric edges, unresolved references)
//! are reported as values by the health checker and never appear here.

use crate::domain::IssueRef;
use crate::materialize::GraphSpecError;
use crate::remote::RemoteError;
use std::io;
use thiserror::Error;

/// The error type for girder operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote API failed, permanently or after retries were exhausted.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The remote has no such issue.
    #[error("Issue not found: {0}")]
    NotFound(IssueRef),

    /// A reference token could not be parsed or is not allowed here.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A caller-supplied value is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A dependency or tracking cycle was found.
    #[error("Cycle detected: {}", path.join(" -> "))]
    Cycle {
        /// Members of the cycle in traversal order, first member repeated at the end
        path: Vec<String>,
    },

    /// A declarative graph spec is structurally invalid.
    #[error("Invalid graph spec: {0}")]
    GraphSpec(#[from] GraphSpecError),

    /// The remote answered with a payload that does not decode.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A specialized Result type for girder operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_shows_full_path() {
        let err = Error::Cycle {
            path: vec!["e1".into(), "t1".into(), "e1".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected: e1 -> t1 -> e1");
    }
}
