//! Batched repository lookup by GraphQL query aliasing.
//!
//! Resolving N repositories one query at a time costs N round trips. Instead,
//! every lookup becomes an aliased field of a single query:
//!
//! ```text
//! query repoId {
//!   repoId_0: repository(owner: "octo-org" name: "api") { ...repoFragment }
//!   repoId_1: repository(owner: "octo-org" name: "web") { ...repoFragment }
//! }
//!
//! fragment repoFragment on Repository { id databaseId name nameWithOwner }
//! ```
//!
//! The response `data` object is keyed by alias, which maps each result back
//! to the lookup that produced it.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::client::{FetchPolicy, GitHubClient};
use super::error::GitHubApiError;
use crate::types::GithubRepo;

/// Query identifier used for installation repository lookups.
pub const REPO_QUERY_ID: &str = "repoId";

const REPO_FRAGMENT: &str = "fragment repoFragment on Repository {
  id
  databaseId
  name
  nameWithOwner
}";

/// Errors from building, running, or decoding a batched query.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    /// The response `data` was not a JSON object.
    #[error("batched response is not an object")]
    NotAnObject,

    /// The response contained a key that is not one of this query's aliases.
    #[error("unexpected key in batched response: {0}")]
    UnexpectedKey(String),

    /// An aliased result did not match the requested shape.
    #[error("could not decode result for {alias}: {source}")]
    Decode {
        alias: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An aggregate query assembled from many aliased sub-queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchedQuery {
    query_id: String,
    selections: Vec<String>,
    fragments: Vec<String>,
}

impl BatchedQuery {
    pub fn new(query_id: impl Into<String>) -> Self {
        BatchedQuery {
            query_id: query_id.into(),
            selections: Vec::new(),
            fragments: Vec::new(),
        }
    }

    /// Adds a fragment shared by the sub-queries.
    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragments.push(fragment.into());
        self
    }

    /// Appends a sub-query. Its alias is `<query_id>_<index>`.
    pub fn push(&mut self, selection: impl Into<String>) {
        self.selections.push(selection.into());
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Returns the alias of the sub-query at `index`.
    pub fn alias(&self, index: usize) -> String {
        format!("{}_{}", self.query_id, index)
    }

    /// Renders the complete query document.
    pub fn render(&self) -> String {
        let fields = self
            .selections
            .iter()
            .enumerate()
            .map(|(index, selection)| format!("  {}: {}", self.alias(index), selection))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "query {} {{\n{}\n}}\n\n{}",
            self.query_id,
            fields,
            self.fragments.join("\n")
        )
    }

    /// Decodes a keyed `data` object into results ordered by alias index.
    ///
    /// Aliases resolving to `null` (e.g., a repository the token cannot see)
    /// are skipped.
    pub fn parse<T: DeserializeOwned>(&self, data: Value) -> Result<Vec<T>, BatchError> {
        let Value::Object(entries) = data else {
            return Err(BatchError::NotAnObject);
        };

        let mut indexed = Vec::with_capacity(entries.len());
        for (alias, value) in entries {
            let index = self
                .alias_index(&alias)
                .ok_or_else(|| BatchError::UnexpectedKey(alias.clone()))?;

            if value.is_null() {
                warn!(alias = %alias, "Batched lookup returned no result");
                continue;
            }

            let item = serde_json::from_value(value)
                .map_err(|source| BatchError::Decode { alias, source })?;
            indexed.push((index, item));
        }

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, item)| item).collect())
    }

    /// Returns the index encoded in one of this query's aliases.
    fn alias_index(&self, alias: &str) -> Option<usize> {
        let index: usize = alias
            .strip_prefix(self.query_id.as_str())?
            .strip_prefix('_')?
            .parse()
            .ok()?;
        (index < self.selections.len()).then_some(index)
    }
}

/// Builds the aggregate query resolving `names` under `owner`.
pub fn repo_lookup_query<S: AsRef<str>>(owner: &str, names: &[S]) -> BatchedQuery {
    let mut query = BatchedQuery::new(REPO_QUERY_ID).fragment(REPO_FRAGMENT);
    for name in names {
        query.push(format!(
            "repository(owner: {} name: {}) {{\n    ...repoFragment\n  }}",
            graphql_string(owner),
            graphql_string(name.as_ref())
        ));
    }
    query
}

/// Resolves every repository in `names` with a single network-only query.
#[instrument(skip(client, names, token), fields(count = names.len()))]
pub async fn fetch_repos<S: AsRef<str>>(
    client: &dyn GitHubClient,
    owner: &str,
    names: &[S],
    token: &str,
) -> Result<Vec<GithubRepo>, BatchError> {
    let query = repo_lookup_query(owner, names);
    let data = client
        .query(&query.render(), FetchPolicy::NetworkOnly, token)
        .await?;
    let repos: Vec<GithubRepo> = query.parse(data)?;

    debug!(
        requested = names.len(),
        resolved = repos.len(),
        "Resolved repositories"
    );
    Ok(repos)
}

/// Quotes a value as a GraphQL string literal.
///
/// GraphQL string escapes are a subset of JSON's, so JSON encoding is valid.
fn graphql_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}
