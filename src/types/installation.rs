//! GitHub App installation records and repository descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::{InstallationId, Login};

/// Which repositories an installation grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositorySelection {
    /// Every repository owned by the account.
    All,
    /// Only the repositories picked during installation.
    Selected,
}

/// The kind of account an app is installed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    User,
    Organization,
    Enterprise,
    /// Any account kind GitHub adds later.
    #[serde(other)]
    Other,
}

/// A recorded grant of app access to an account's repositories.
///
/// Created when an `installation.created` event arrives and removed in full
/// on `installation.deleted`. Never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub installation_id: InstallationId,

    /// Permission name to access level (e.g., `"pull_requests" -> "read"`).
    pub permissions: BTreeMap<String, String>,

    /// Webhook events the installation subscribes to.
    pub events: Vec<String>,

    pub repository_selection: RepositorySelection,

    #[serde(rename = "type")]
    pub account_type: AccountType,

    pub login: Login,

    pub avatar_url: String,
}

/// A repository resolved through the GraphQL API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubRepo {
    /// GraphQL node ID.
    pub id: String,

    /// REST/database ID.
    pub database_id: u64,

    pub name: String,

    /// `owner/name`.
    pub name_with_owner: String,
}
