//! Shared fakes and fixtures for tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::BoxError;
use crate::github::{FetchPolicy, GitHubApiError, GitHubClient};
use crate::store::{self, InMemoryInstallationStore, InstallationStore};
use crate::types::{
    AccountType, GithubRepo, InstallationId, InstallationRecord, Login, RepositorySelection,
    UserRecord,
};
use crate::webhooks::{WebhookListener, WebhookListenerResponse, WebhookPayload};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Fixtures ───

pub fn new_fake_user_record() -> UserRecord {
    UserRecord {
        username: "fake-username".to_string(),
        github_token: "fake-token".to_string(),
        scopes: vec!["repo".to_string()],
        avatar_url: Some("https://example.com/avatar.png".to_string()),
        fullname: Some("Fakey McFakeFace".to_string()),
    }
}

pub fn sample_installation_record(login: &str) -> InstallationRecord {
    InstallationRecord {
        installation_id: InstallationId(99),
        permissions: BTreeMap::from([("pull_requests".to_string(), "read".to_string())]),
        events: vec!["pull_request".to_string()],
        repository_selection: RepositorySelection::Selected,
        account_type: AccountType::Organization,
        login: Login::from(login),
        avatar_url: format!("https://avatars.example.com/{}", login),
    }
}

pub fn sample_repo(owner: &str, name: &str, id: u64) -> GithubRepo {
    GithubRepo {
        id: format!("node-{}", id),
        database_id: id,
        name: name.to_string(),
        name_with_owner: format!("{}/{}", owner, name),
    }
}

/// A repository as the GraphQL API returns it.
pub fn repo_json(owner: &str, name: &str, id: u64) -> Value {
    json!({
        "id": format!("node-{}", id),
        "databaseId": id,
        "name": name,
        "nameWithOwner": format!("{}/{}", owner, name),
    })
}

/// An `installation` webhook body for an organization install.
///
/// `repos: None` leaves the `repositories` field out entirely.
pub fn install_hook_body(action: &str, login: &str, repos: Option<&[&str]>) -> Value {
    let mut body = json!({
        "action": action,
        "installation": {
            "id": 99,
            "repository_selection": "selected",
            "permissions": { "pull_requests": "read" },
            "events": ["pull_request"],
            "account": {
                "login": login,
                "avatar_url": format!("https://avatars.example.com/{}", login),
                "type": "Organization",
            },
        },
    });

    if let Some(repos) = repos {
        body["repositories"] = repos
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({
                    "id": i + 1,
                    "name": name,
                    "full_name": format!("{}/{}", login, name),
                })
            })
            .collect();
    }
    body
}

// ─── GitHub ───

/// A recorded GraphQL call.
#[derive(Debug, Clone)]
pub struct QueryCall {
    pub query: String,
    pub policy: FetchPolicy,
    pub token: String,
}

/// A scripted [`GitHubClient`].
///
/// Queries are answered from a queue, in order. REST gets are answered by
/// path; unknown paths fail with a 404.
#[derive(Debug, Default)]
pub struct FakeGitHubClient {
    query_responses: Mutex<VecDeque<Value>>,
    query_failure: Option<String>,
    get_responses: HashMap<String, Value>,
    queries: Mutex<Vec<QueryCall>>,
    gets: Mutex<Vec<String>>,
}

impl FakeGitHubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_response(self, data: Value) -> Self {
        lock(&self.query_responses).push_back(data);
        self
    }

    /// Makes every query fail with `message`.
    pub fn failing_queries(mut self, message: &str) -> Self {
        self.query_failure = Some(message.to_string());
        self
    }

    pub fn with_get_response(mut self, path: &str, body: Value) -> Self {
        self.get_responses.insert(path.to_string(), body);
        self
    }

    pub fn queries(&self) -> Vec<QueryCall> {
        lock(&self.queries).clone()
    }

    pub fn gets(&self) -> Vec<String> {
        lock(&self.gets).clone()
    }
}

#[async_trait]
impl GitHubClient for FakeGitHubClient {
    async fn query(
        &self,
        query: &str,
        policy: FetchPolicy,
        token: &str,
    ) -> Result<Value, GitHubApiError> {
        lock(&self.queries).push(QueryCall {
            query: query.to_string(),
            policy,
            token: token.to_string(),
        });

        if let Some(message) = &self.query_failure {
            return Err(GitHubApiError::permanent_without_source(message.clone()));
        }
        lock(&self.query_responses)
            .pop_front()
            .ok_or_else(|| GitHubApiError::permanent_without_source("no scripted query response"))
    }

    async fn get(&self, path: &str, _token: &str) -> Result<Value, GitHubApiError> {
        lock(&self.gets).push(path.to_string());

        self.get_responses.get(path).cloned().ok_or_else(|| {
            let mut err = GitHubApiError::permanent_without_source(format!("Not Found: {}", path));
            err.status_code = Some(404);
            err
        })
    }
}

// ─── Store ───

/// An in-memory store that logs every write.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryInstallationStore,
    calls: Mutex<Vec<&'static str>>,
    repos_written: Mutex<Vec<Vec<GithubRepo>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the write operations performed, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    /// Every batch passed to `add_repos`.
    pub fn repos_written(&self) -> Vec<Vec<GithubRepo>> {
        lock(&self.repos_written).clone()
    }
}

#[async_trait]
impl InstallationStore for RecordingStore {
    async fn add_installation(&self, record: InstallationRecord) -> store::Result<()> {
        lock(&self.calls).push("add_installation");
        self.inner.add_installation(record).await
    }

    async fn add_repos(&self, login: &Login, repos: Vec<GithubRepo>) -> store::Result<()> {
        lock(&self.calls).push("add_repos");
        lock(&self.repos_written).push(repos.clone());
        self.inner.add_repos(login, repos).await
    }

    async fn delete_installation(&self, login: &Login) -> store::Result<()> {
        lock(&self.calls).push("delete_installation");
        self.inner.delete_installation(login).await
    }

    async fn installation(&self, login: &Login) -> store::Result<Option<InstallationRecord>> {
        self.inner.installation(login).await
    }

    async fn repos(&self, login: &Login) -> store::Result<Vec<GithubRepo>> {
        self.inner.repos(login).await
    }
}

// ─── Listeners ───

/// Shared, ordered record of which listeners ran.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    fn push(&self, id: &str) {
        lock(&self.0).push(id.to_string());
    }
}

enum Behavior {
    Respond,
    Silent,
    Fail(String),
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// A [`WebhookListener`] that counts its calls.
pub struct RecordingListener {
    id: String,
    behavior: Behavior,
    calls: AtomicUsize,
    log: Option<CallLog>,
    on_call: Option<Hook>,
}

impl RecordingListener {
    fn with_behavior(id: &str, behavior: Behavior) -> Self {
        RecordingListener {
            id: id.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            log: None,
            on_call: None,
        }
    }

    /// Answers every event with a response carrying `id`.
    pub fn responding(id: &str) -> Self {
        Self::with_behavior(id, Behavior::Respond)
    }

    /// Handles every event without reporting anything.
    pub fn silent(id: &str) -> Self {
        Self::with_behavior(id, Behavior::Silent)
    }

    /// Fails every event with `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_behavior("failing", Behavior::Fail(message.to_string()))
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Runs `hook` at the start of every call.
    pub fn on_call(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookListener for RecordingListener {
    async fn handle_webhook_event(
        &self,
        _payload: &WebhookPayload,
    ) -> Result<Option<WebhookListenerResponse>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_call {
            hook();
        }
        if let Some(log) = &self.log {
            log.push(&self.id);
        }

        match &self.behavior {
            Behavior::Respond => Ok(Some(WebhookListenerResponse::new(self.id.as_str()))),
            Behavior::Silent => Ok(None),
            Behavior::Fail(message) => Err(message.clone().into()),
        }
    }
}
