//! In-memory installation store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{InstallationStore, Result};
use crate::types::{GithubRepo, InstallationRecord, Login};

/// An [`InstallationStore`] that keeps everything in process memory.
///
/// Used when no state directory is configured, and in tests.
#[derive(Debug, Default)]
pub struct InMemoryInstallationStore {
    installations: RwLock<HashMap<Login, InstallationRecord>>,
    repos: RwLock<HashMap<Login, Vec<GithubRepo>>>,
}

impl InMemoryInstallationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstallationStore for InMemoryInstallationStore {
    async fn add_installation(&self, record: InstallationRecord) -> Result<()> {
        self.installations
            .write()
            .await
            .insert(record.login.clone(), record);
        Ok(())
    }

    async fn add_repos(&self, login: &Login, repos: Vec<GithubRepo>) -> Result<()> {
        self.repos.write().await.insert(login.clone(), repos);
        Ok(())
    }

    async fn delete_installation(&self, login: &Login) -> Result<()> {
        self.installations.write().await.remove(login);
        self.repos.write().await.remove(login);
        Ok(())
    }

    async fn installation(&self, login: &Login) -> Result<Option<InstallationRecord>> {
        Ok(self.installations.read().await.get(login).cloned())
    }

    async fn repos(&self, login: &Login) -> Result<Vec<GithubRepo>> {
        Ok(self
            .repos
            .read()
            .await
            .get(login)
            .cloned()
            .unwrap_or_default())
    }
}
