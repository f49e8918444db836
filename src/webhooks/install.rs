//! GitHub App installation lifecycle.
//!
//! | Action | Effect |
//! |--------|--------|
//! | `created` | resolve the granted repositories in one batched query, then store both |
//! | `deleted` | delete everything stored for the account |
//! | anything else | reported as unhandled |

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use super::events::{WebhookPayload, WebhookType};
use super::listener::{NotificationSent, WebhookListener, WebhookListenerResponse};
use crate::BoxError;
use crate::github::{BatchError, GitHubClient, fetch_repos};
use crate::store::{InstallationStore, StoreError};
use crate::types::{AccountType, InstallationId, InstallationRecord, Login, RepositorySelection};

/// Listener ID reported for handled installation events.
pub const INSTALL_LISTENER_ID: &str = "github-app-install";

/// Errors that can occur while recording an installation change.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The event body is not an installation hook.
    #[error("malformed installation payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("repository lookup failed: {0}")]
    Lookup(#[from] BatchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Body of an `installation` webhook.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstallHook {
    pub action: String,
    pub installation: HookInstallation,

    /// Repositories granted at install time; absent for "all repositories"
    /// installs on some payload versions.
    #[serde(default)]
    pub repositories: Option<Vec<HookRepository>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HookInstallation {
    pub id: InstallationId,
    pub repository_selection: RepositorySelection,
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
    #[serde(default)]
    pub events: Vec<String>,
    pub account: HookAccount,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HookAccount {
    pub login: Login,
    pub avatar_url: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HookRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
}

/// Result of handling an installation event.
///
/// Unrecognized actions and installs without repositories are not errors;
/// they come back with `handled: false` and a message saying why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub handled: bool,
    pub notifications: Option<Vec<NotificationSent>>,
    pub message: Option<String>,
}

impl InstallOutcome {
    fn handled(message: &str) -> Self {
        InstallOutcome {
            handled: true,
            notifications: None,
            message: Some(message.to_string()),
        }
    }

    fn unhandled(message: impl Into<String>) -> Self {
        InstallOutcome {
            handled: false,
            notifications: None,
            message: Some(message.into()),
        }
    }
}

impl InstallHook {
    fn record(&self) -> InstallationRecord {
        let installation = &self.installation;
        InstallationRecord {
            installation_id: installation.id,
            permissions: installation.permissions.clone(),
            events: installation.events.clone(),
            repository_selection: installation.repository_selection,
            account_type: installation.account.account_type,
            login: installation.account.login.clone(),
            avatar_url: installation.account.avatar_url.clone(),
        }
    }
}

/// Actions that need the full hook body.
const HANDLED_ACTIONS: [&str; 2] = ["created", "deleted"];

fn unexpected_action(action: &str) -> InstallOutcome {
    InstallOutcome::unhandled(format!("Unexpected installation action: {}", action))
}

/// Records an installation change.
///
/// `gql_token` authenticates the batched repository lookup.
#[instrument(
    skip_all,
    fields(action = %hook.action, login = %hook.installation.account.login)
)]
pub async fn handle_github_app_install(
    hook: &InstallHook,
    github: &dyn GitHubClient,
    store: &dyn InstallationStore,
    gql_token: &str,
) -> Result<InstallOutcome, InstallError> {
    match hook.action.as_str() {
        "created" => handle_new_install(hook, github, store, gql_token).await,
        "deleted" => {
            store
                .delete_installation(&hook.installation.account.login)
                .await?;
            info!("Installation deleted");
            Ok(InstallOutcome::handled("Deletion recorded on backend"))
        }
        other => Ok(unexpected_action(other)),
    }
}

async fn handle_new_install(
    hook: &InstallHook,
    github: &dyn GitHubClient,
    store: &dyn InstallationStore,
    gql_token: &str,
) -> Result<InstallOutcome, InstallError> {
    let names: Vec<&str> = match &hook.repositories {
        Some(repos) if !repos.is_empty() => repos.iter().map(|r| r.name.as_str()).collect(),
        _ => return Ok(InstallOutcome::unhandled("No repositories defined.")),
    };

    let owner = &hook.installation.account.login;
    let repos = fetch_repos(github, owner.as_str(), &names, gql_token).await?;

    store.add_installation(hook.record()).await?;
    let count = repos.len();
    store.add_repos(owner, repos).await?;

    info!(
        installation_id = %hook.installation.id,
        repos = count,
        "Installation recorded"
    );
    Ok(InstallOutcome::handled("Install recorded on backend"))
}

/// Listener recording installation changes in the store.
pub struct InstallationListener {
    github: Arc<dyn GitHubClient>,
    store: Arc<dyn InstallationStore>,
    gql_token: String,
}

impl InstallationListener {
    pub fn new(
        github: Arc<dyn GitHubClient>,
        store: Arc<dyn InstallationStore>,
        gql_token: impl Into<String>,
    ) -> Self {
        InstallationListener {
            github,
            store,
            gql_token: gql_token.into(),
        }
    }

    /// Event types this listener handles.
    pub const EVENTS: [WebhookType; 1] = [WebhookType::Installation];
}

#[async_trait]
impl WebhookListener for InstallationListener {
    async fn handle_webhook_event(
        &self,
        payload: &WebhookPayload,
    ) -> Result<Option<WebhookListenerResponse>, BoxError> {
        let action = payload.body.get("action").and_then(Value::as_str);
        let outcome = match action {
            Some(action) if HANDLED_ACTIONS.contains(&action) => {
                let hook: InstallHook =
                    serde_json::from_value(payload.body.clone()).map_err(InstallError::Payload)?;
                handle_github_app_install(
                    &hook,
                    self.github.as_ref(),
                    self.store.as_ref(),
                    &self.gql_token,
                )
                .await?
            }
            other => unexpected_action(other.unwrap_or("<missing>")),
        };

        if !outcome.handled {
            info!(
                reason = outcome.message.as_deref().unwrap_or_default(),
                "Installation event not handled"
            );
            return Ok(None);
        }

        Ok(Some(WebhookListenerResponse {
            id: INSTALL_LISTENER_ID.to_string(),
            notifications: outcome.notifications.unwrap_or_default(),
        }))
    }
}

impl std::fmt::Debug for InstallationListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationListener").finish_non_exhaustive()
    }
}
