//! HTTP transport for the GitHub GraphQL endpoint.

use super::{ApiError, Request, Transport, TransportError};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Public GitHub GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Per-request timeout; a timeout surfaces as a transient failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error body kept in a message.
const MAX_BODY_EXCERPT: usize = 200;

/// Transport that POSTs GraphQL documents over HTTPS.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for `endpoint` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("girder/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<RawApiError>,
}

#[derive(Deserialize)]
struct RawApiError {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    path: Option<Vec<Value>>,
}

impl From<RawApiError> for ApiError {
    fn from(raw: RawApiError) -> Self {
        // Path segments are field names or list indices.
        let path = raw.path.map(|segments| {
            segments
                .into_iter()
                .map(|segment| match segment {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()
        });
        Self {
            message: raw.message,
            error_type: raw.error_type,
            path,
        }
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> std::result::Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header("GraphQL-Features", "sub_issues")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::new(format!("request timed out: {e}"))
                } else {
                    TransportError::new(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::http(
                status.as_u16(),
                format!("HTTP {}: {}", status.as_u16(), excerpt(&body)),
            ));
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| TransportError::new(format!("invalid response body: {e}")))?;

        if !envelope.errors.is_empty() {
            let errors = envelope.errors.into_iter().map(ApiError::from).collect();
            return Err(TransportError::api(errors));
        }

        envelope
            .data
            .ok_or_else(|| TransportError::new("response carried neither data nor errors"))
    }
}
