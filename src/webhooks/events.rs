//! Webhook event types.
//!
//! Each delivery is tagged by the `X-GitHub-Event` header. The dashboard
//! knows a closed set of tags; any other tag is acknowledged and ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A GitHub webhook event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookType {
    /// The app was installed, uninstalled, suspended, ...
    Installation,
    /// Repositories were added to or removed from an installation.
    InstallationRepositories,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    IssueComment,
    /// Legacy commit status API.
    Status,
    CheckRun,
    CheckSuite,
    Push,
    /// Sent once when a webhook is created.
    Ping,
}

impl WebhookType {
    pub const ALL: [WebhookType; 11] = [
        WebhookType::Installation,
        WebhookType::InstallationRepositories,
        WebhookType::PullRequest,
        WebhookType::PullRequestReview,
        WebhookType::PullRequestReviewComment,
        WebhookType::IssueComment,
        WebhookType::Status,
        WebhookType::CheckRun,
        WebhookType::CheckSuite,
        WebhookType::Push,
        WebhookType::Ping,
    ];

    /// Returns the tag as sent in `X-GitHub-Event`.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookType::Installation => "installation",
            WebhookType::InstallationRepositories => "installation_repositories",
            WebhookType::PullRequest => "pull_request",
            WebhookType::PullRequestReview => "pull_request_review",
            WebhookType::PullRequestReviewComment => "pull_request_review_comment",
            WebhookType::IssueComment => "issue_comment",
            WebhookType::Status => "status",
            WebhookType::CheckRun => "check_run",
            WebhookType::CheckSuite => "check_suite",
            WebhookType::Push => "push",
            WebhookType::Ping => "ping",
        }
    }

    /// Parses an `X-GitHub-Event` value. Unknown tags return `None`.
    pub fn parse(tag: &str) -> Option<WebhookType> {
        WebhookType::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for WebhookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One webhook occurrence: its type tag and the raw JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub kind: WebhookType,
    pub body: serde_json::Value,
}

impl WebhookPayload {
    pub fn new(kind: WebhookType, body: serde_json::Value) -> Self {
        WebhookPayload { kind, body }
    }
}

/// One or more event types to subscribe a listener to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypes(pub Vec<WebhookType>);

impl From<WebhookType> for EventTypes {
    fn from(kind: WebhookType) -> Self {
        EventTypes(vec![kind])
    }
}

impl From<Vec<WebhookType>> for EventTypes {
    fn from(kinds: Vec<WebhookType>) -> Self {
        EventTypes(kinds)
    }
}

impl From<&[WebhookType]> for EventTypes {
    fn from(kinds: &[WebhookType]) -> Self {
        EventTypes(kinds.to_vec())
    }
}

impl<const N: usize> From<[WebhookType; N]> for EventTypes {
    fn from(kinds: [WebhookType; N]) -> Self {
        EventTypes(kinds.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_matches_serde_names() {
        for kind in WebhookType::ALL {
            let via_serde = serde_json::to_value(kind).unwrap();
            assert_eq!(via_serde, kind.as_str());
            assert_eq!(WebhookType::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn parse_unknown_tag_is_none() {
        assert_eq!(WebhookType::parse("deployment"), None);
        assert_eq!(WebhookType::parse(""), None);
    }

    #[test]
    fn event_types_normalize_single_and_many() {
        let single: EventTypes = WebhookType::Push.into();
        assert_eq!(single.0, vec![WebhookType::Push]);

        let many: EventTypes = [WebhookType::Push, WebhookType::Status].into();
        assert_eq!(many.0.len(), 2);
    }
}
