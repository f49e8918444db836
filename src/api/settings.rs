//! Organization settings API.
//!
//! `POST /api/settings/orgs.json` lists the signed-in user's organizations
//! and whether each one already has the dashboard webhook installed.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::envelope::ApiResponse;
use super::router::{ApiRouter, PrivateExecutor, private_callback};
use super::users::UserStore;
use super::wrapper::RouteOptions;
use crate::BoxError;
use crate::github::{FetchPolicy, GitHubApiError, GitHubClient};
use crate::types::UserRecord;

/// Error code for a user token lacking the scopes below.
pub const MISSING_SCOPE: &str = "missing-scope";

/// OAuth scopes needed to inspect organization hooks.
pub const REQUIRED_SCOPES: [&str; 2] = ["admin:org_hook", "read:org"];

const ORG_DETAILS_QUERY: &str = "query OrgDetails {
  viewer {
    organizations(first: 20) {
      nodes {
        name
        login
        viewerCanAdminister
      }
      totalCount
    }
  }
}";

#[derive(Debug, Deserialize)]
struct OrgDetails {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    organizations: OrgConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgConnection {
    nodes: Option<Vec<Option<OrgNode>>>,
    total_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgNode {
    name: Option<String>,
    login: String,
    viewer_can_administer: bool,
}

#[derive(Debug, Deserialize)]
struct Hook {
    config: HookConfig,
}

#[derive(Debug, Deserialize)]
struct HookConfig {
    url: Option<String>,
}

/// One organization as reported to the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgWebHookState {
    pub name: Option<String>,
    pub login: String,
    pub viewer_can_administer: bool,
    pub hook_enabled: bool,
}

/// Handlers behind `/api/settings`.
pub struct SettingsApi {
    github: Arc<dyn GitHubClient>,
    webhook_url: String,
}

impl SettingsApi {
    pub fn new(github: Arc<dyn GitHubClient>, webhook_url: impl Into<String>) -> Self {
        SettingsApi {
            github,
            webhook_url: webhook_url.into(),
        }
    }

    /// Builds the private router, mounted under `/api/settings`.
    pub fn routes(self: Arc<Self>, users: Arc<dyn UserStore>) -> Router {
        let api = self;
        ApiRouter::new(PrivateExecutor::new(users))
            .post(
                "/orgs.json",
                private_callback(move |_, user| {
                    let api = Arc::clone(&api);
                    async move { api.orgs(&user).await }
                }),
                RouteOptions::default(),
            )
            .into_router()
    }

    /// Lists the user's organizations with their webhook state.
    #[instrument(skip_all, fields(user = %user.username))]
    pub async fn orgs(&self, user: &UserRecord) -> Result<ApiResponse, BoxError> {
        if !user.has_scopes(&REQUIRED_SCOPES) {
            return Ok(ApiResponse::error(
                StatusCode::BAD_REQUEST,
                MISSING_SCOPE,
                "Missing required scope.",
            ));
        }

        let data = self
            .github
            .query(ORG_DETAILS_QUERY, FetchPolicy::NetworkOnly, &user.github_token)
            .await?;
        let details: OrgDetails = serde_json::from_value(data)?;
        let connection = details.viewer.organizations;

        let nodes: Vec<OrgNode> = connection
            .nodes
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        if connection.total_count > nodes.len() {
            // TODO: page through organizations past the first 20.
            warn!(
                total = connection.total_count,
                returned = nodes.len(),
                "Organization list truncated"
            );
        }

        let orgs = try_join_all(
            nodes
                .into_iter()
                .map(|org| self.org_state(org, &user.github_token)),
        )
        .await?;

        debug!(orgs = orgs.len(), "Organizations listed");
        Ok(ApiResponse::ok(json!({ "orgs": orgs })))
    }

    async fn org_state(
        &self,
        org: OrgNode,
        token: &str,
    ) -> Result<OrgWebHookState, GitHubApiError> {
        let hook_enabled = if org.viewer_can_administer {
            self.hook_enabled(&org.login, token).await?
        } else {
            false
        };

        Ok(OrgWebHookState {
            name: org.name,
            login: org.login,
            viewer_can_administer: org.viewer_can_administer,
            hook_enabled,
        })
    }

    async fn hook_enabled(&self, login: &str, token: &str) -> Result<bool, GitHubApiError> {
        let path = format!("orgs/{}/hooks", urlencoding::encode(login));
        let value = self.github.get(&path, token).await.inspect_err(|err| {
            warn!(
                org = login,
                retriable = err.kind.is_retriable(),
                error = %err,
                "Hook lookup failed"
            );
        })?;
        let hooks: Vec<Hook> = serde_json::from_value(value).map_err(|err| {
            GitHubApiError::permanent_without_source(format!("unexpected hooks response: {}", err))
        })?;

        Ok(hooks
            .iter()
            .any(|hook| hook.config.url.as_deref() == Some(self.webhook_url.as_str())))
    }
}

impl std::fmt::Debug for SettingsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsApi")
            .field("webhook_url", &self.webhook_url)
            .finish_non_exhaustive()
    }
}
