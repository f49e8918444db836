//! GitHub API client.
//!
//! [`GitHubClient`] is the narrow interface the rest of the crate uses to talk
//! to GitHub: one GraphQL entry point and one REST `GET`. [`OctocrabClient`]
//! implements it on top of octocrab. Each call carries its own token because
//! the dashboard acts both as the app (installation lookups) and on behalf of
//! signed-in users (settings).

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use octocrab::Octocrab;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::error::GitHubApiError;

/// How a GraphQL query may use previously fetched results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchPolicy {
    /// Always hit the network. Results are not cached.
    #[default]
    NetworkOnly,

    /// Serve from the in-process cache when the same query was already run
    /// with the same token.
    CacheFirst,
}

/// Remote lookup collaborator.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// Runs a GraphQL query and returns its `data` object.
    async fn query(
        &self,
        query: &str,
        policy: FetchPolicy,
        token: &str,
    ) -> Result<Value, GitHubApiError>;

    /// Performs a REST `GET` against a path relative to the API root
    /// (e.g., `orgs/octo-org/hooks`).
    async fn get(&self, path: &str, token: &str) -> Result<Value, GitHubApiError>;
}

/// Most GraphQL responses kept for [`FetchPolicy::CacheFirst`].
const MAX_CACHED_QUERIES: usize = 256;

/// Most per-token octocrab clients kept alive at once.
const MAX_CLIENTS: usize = 64;

/// Insertion-ordered map that drops its oldest entry once full.
#[derive(Debug)]
struct BoundedCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    fn new(capacity: usize) -> Self {
        BoundedCache {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: K, value: V) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`GitHubClient`] backed by octocrab.
pub struct OctocrabClient {
    /// GraphQL responses keyed by `(token, query)`. Only written for
    /// [`FetchPolicy::CacheFirst`].
    queries: Mutex<BoundedCache<(String, String), Value>>,

    /// One authenticated octocrab instance per token.
    clients: Mutex<BoundedCache<String, Octocrab>>,
}

impl OctocrabClient {
    pub fn new() -> Self {
        OctocrabClient {
            queries: Mutex::new(BoundedCache::new(MAX_CACHED_QUERIES)),
            clients: Mutex::new(BoundedCache::new(MAX_CLIENTS)),
        }
    }

    fn client_for(&self, token: &str) -> Result<Octocrab, GitHubApiError> {
        let key = token.to_string();
        if let Some(client) = lock(&self.clients).get(&key) {
            return Ok(client);
        }

        let client = Octocrab::builder()
            .personal_token(key.clone())
            .build()
            .map_err(GitHubApiError::from_octocrab)?;
        lock(&self.clients).insert(key, client.clone());
        Ok(client)
    }

    fn cached(&self, key: &(String, String)) -> Option<Value> {
        lock(&self.queries).get(key)
    }

    fn remember(&self, policy: FetchPolicy, key: (String, String), value: &Value) {
        if policy == FetchPolicy::CacheFirst {
            lock(&self.queries).insert(key, value.clone());
        }
    }
}

impl Default for OctocrabClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl GitHubClient for OctocrabClient {
    #[instrument(skip(self, query, token))]
    async fn query(
        &self,
        query: &str,
        policy: FetchPolicy,
        token: &str,
    ) -> Result<Value, GitHubApiError> {
        let key = (token.to_string(), query.to_string());

        if policy == FetchPolicy::CacheFirst
            && let Some(hit) = self.cached(&key)
        {
            debug!("Serving GraphQL query from cache");
            return Ok(hit);
        }

        let client = self.client_for(token)?;
        let response: Value = client
            .graphql(&json!({ "query": query }))
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let data = extract_graphql_data(response)?;
        self.remember(policy, key, &data);
        Ok(data)
    }

    #[instrument(skip(self, token))]
    async fn get(&self, path: &str, token: &str) -> Result<Value, GitHubApiError> {
        let client = self.client_for(token)?;
        let route = format!("/{}", path.trim_start_matches('/'));

        client
            .get(route, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)
    }
}

/// Pulls the `data` object out of a GraphQL response body.
///
/// GitHub answers partially failed queries with both `data` and `errors`; the
/// data is kept in that case. A response with no usable data is an error.
fn extract_graphql_data(mut response: Value) -> Result<Value, GitHubApiError> {
    match response.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => match response.get("errors") {
            Some(errors) => Err(GitHubApiError::graphql(errors)),
            None => Err(GitHubApiError::permanent_without_source(
                "GraphQL response has no data",
            )),
        },
    }
}
