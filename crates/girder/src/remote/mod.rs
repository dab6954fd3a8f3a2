//! Resilient request layer for the remote issue API.
//!
//! One logical call is a GraphQL document plus a variable map. The
//! [`Transport`] trait performs a single raw exchange; [`RemoteClient`] wraps
//! a transport with classification of failures, exponential backoff with
//! jitter, and a dry-run short-circuit.
//!
//! # Failure classification
//!
//! A failure is *transient* when the HTTP status is 429/502/503/504, when
//! any message mentions rate limiting, a 5xx gateway status or a timeout, or
//! when the API tags an error `RATE_LIMITED`. Transient failures are retried
//! up to [`RetryConfig::max_retries`] times; everything else is returned on
//! the first attempt.
//!
//! This layer knows nothing about issues or graphs.

mod client;
mod http;

pub use client::{RemoteClient, RetryConfig, MAX_JITTER};
pub use http::{HttpTransport, DEFAULT_ENDPOINT};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Substrings (lower-case) that mark a failure message as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "502",
    "503",
    "504",
    "429",
    "bad gateway",
    "service unavailable",
    "rate limit",
    "secondary rate",
    "timeout",
    "timed out",
];

/// HTTP statuses that are always retried.
const TRANSIENT_STATUSES: &[u16] = &[429, 502, 503, 504];

/// API error type emitted for rate limiting.
const RATE_LIMITED_TYPE: &str = "RATE_LIMITED";

/// API error type emitted for missing objects.
const NOT_FOUND_TYPE: &str = "NOT_FOUND";

/// A single GraphQL request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Query or mutation document
    pub query: String,

    /// Named variables
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl Request {
    /// Create a request with no variables.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    /// Add a named variable.
    #[must_use]
    pub fn var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Skip the network and return the would-be request
    pub dry_run: bool,

    /// Opaque token attached to log output for this call
    pub correlation_id: Option<String>,
}

/// One structured error reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message
    pub message: String,

    /// Machine type tag (e.g. `NOT_FOUND`, `RATE_LIMITED`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Field path the error applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl ApiError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            path: None,
        }
    }

    /// Set the machine type tag.
    #[must_use]
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_type {
            Some(t) => write!(f, "{} ({t})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Failure of a single raw exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Summary message
    pub message: String,

    /// HTTP status, when a response was received
    pub status: Option<u16>,

    /// Structured errors decoded from the response body
    pub errors: Vec<ApiError>,
}

impl TransportError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            errors: Vec::new(),
        }
    }

    /// Create an error for a non-success HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            errors: Vec::new(),
        }
    }

    /// Create an error from structured API errors.
    pub fn api(errors: Vec<ApiError>) -> Self {
        let message = errors
            .first()
            .map_or_else(|| "remote returned errors".to_string(), |e| e.message.clone());
        Self {
            message,
            status: None,
            errors,
        }
    }

    /// Returns `true` if the failure is worth retrying.
    pub fn is_retryable(&self) -> bool {
        if self
            .status
            .is_some_and(|status| TRANSIENT_STATUSES.contains(&status))
        {
            return true;
        }

        if self
            .errors
            .iter()
            .any(|e| e.error_type.as_deref() == Some(RATE_LIMITED_TYPE))
        {
            return true;
        }

        std::iter::once(&self.message)
            .chain(self.errors.iter().map(|e| &e.message))
            .any(|text| is_transient_text(text))
    }

    /// Structured errors to hand back to the caller.
    ///
    /// Failures without a decoded error list become a single error whose type
    /// tag is the HTTP status, when there was one.
    pub fn into_api_errors(self) -> Vec<ApiError> {
        if !self.errors.is_empty() {
            return self.errors;
        }
        let mut error = ApiError::new(self.message);
        if let Some(status) = self.status {
            error.error_type = Some(format!("HTTP_{status}"));
        }
        vec![error]
    }
}

/// Returns `true` if `text` carries a transient-failure marker.
pub fn is_transient_text(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Successful result of [`RemoteClient::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Decoded `data` payload (the would-be request in dry-run mode)
    pub data: Value,

    /// Number of transport attempts made (0 in dry-run mode)
    pub attempts: u32,

    /// Whether the call was short-circuited by dry-run
    pub dry_run: bool,
}

/// Failed result of [`RemoteClient::send`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote request failed after {attempts} attempt(s): {}", summary(errors))]
pub struct RemoteError {
    /// Every structured error from the last attempt
    pub errors: Vec<ApiError>,

    /// Number of transport attempts made
    pub attempts: u32,
}

fn summary(errors: &[ApiError]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RemoteError {
    /// Returns `true` if the remote reported the target object missing.
    pub fn is_not_found(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.error_type.as_deref() == Some(NOT_FOUND_TYPE))
    }

    /// Returns `true` if the last failure was transient (retries exhausted).
    pub fn is_transient(&self) -> bool {
        self.errors.iter().any(|e| {
            e.error_type.as_deref() == Some(RATE_LIMITED_TYPE)
                || e.error_type.as_deref().is_some_and(|t| {
                    t.strip_prefix("HTTP_")
                        .and_then(|s| s.parse::<u16>().ok())
                        .is_some_and(|s| TRANSIENT_STATUSES.contains(&s))
                })
                || is_transient_text(&e.message)
        })
    }
}

/// One raw request/response exchange with the remote API.
///
/// Implementations perform exactly one attempt; retries belong to
/// [`RemoteClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` and return the decoded `data` payload.
    async fn execute(&self, request: &Request) -> Result<Value, TransportError>;
}
