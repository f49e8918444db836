//! GitHub API error types.
//!
//! Nothing at this layer retries, but errors are still categorized so that
//! callers and logs can tell a flaky GitHub from a request that will never
//! succeed:
//!
//! - **Transient** errors (5xx, rate limits, network failures) may succeed later
//! - **Permanent** errors (most 4xx, GraphQL errors, malformed responses) won't

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// The same request may succeed if repeated later.
    Transient,

    /// The request is wrong or forbidden; repeating it won't help.
    Permanent,
}

impl GitHubErrorKind {
    /// Returns true if repeating the request could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// A GitHub API error with categorization.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates a permanent error without an octocrab source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error for a GraphQL response carrying an `errors` array and no data.
    pub fn graphql(errors: &serde_json::Value) -> Self {
        let message = errors
            .as_array()
            .map(|errs| {
                errs.iter()
                    .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| errors.to_string());

        Self::permanent_without_source(format!("GraphQL query failed: {}", message))
    }

    /// Categorizes an octocrab error.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = match &err {
            octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
            _ => None,
        };
        let message = err.to_string();

        Self {
            kind: classify(status_code, &message),
            status_code,
            message,
            source: Some(err),
        }
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "api rate", "abuse detection"];
const NETWORK_MARKERS: &[&str] = &["timeout", "timed out", "connection", "network", "dns"];

fn mentions_any(message: &str, markers: &[&str]) -> bool {
    let lower = message.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

/// Throttling (429, rate-limited 403), 5xx and transport failures are
/// transient; every other failure is permanent.
fn classify(status_code: Option<u16>, message: &str) -> GitHubErrorKind {
    let transient = match status_code {
        Some(429) => true,
        Some(403) => mentions_any(message, RATE_LIMIT_MARKERS),
        Some(code) => (500..600).contains(&code),
        None => mentions_any(message, NETWORK_MARKERS),
    };

    if transient {
        GitHubErrorKind::Transient
    } else {
        GitHubErrorKind::Permanent
    }
}
