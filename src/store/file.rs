//! JSON file installation store.
//!
//! # Layout
//!
//! ```text
//! <state_dir>/<login>/installation.json
//! <state_dir>/<login>/repos.json
//! ```
//!
//! Every file is replaced atomically (see [`super::fsync::write_atomic`]).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::fsync::{fsync_dir, remove_if_exists, write_atomic};
use super::{InstallationStore, Result, StoreError};
use crate::types::{GithubRepo, InstallationRecord, Login};

const INSTALLATION_FILE: &str = "installation.json";
const REPOS_FILE: &str = "repos.json";

/// An [`InstallationStore`] persisting each account under its own directory.
#[derive(Debug)]
pub struct FileInstallationStore {
    state_dir: PathBuf,

    /// Serializes writers so two writes never share a temp file.
    write_lock: Mutex<()>,
}

impl FileInstallationStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        FileInstallationStore {
            state_dir: state_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn account_dir(&self, login: &Login) -> Result<PathBuf> {
        validate_login(login)?;
        Ok(self.state_dir.join(login.as_str()))
    }
}

/// Rejects logins that would escape the state directory.
///
/// Anything outside the characters GitHub allows in account names is refused
/// rather than sanitized.
fn validate_login(login: &Login) -> Result<()> {
    let s = login.as_str();
    let valid = !s.is_empty()
        && s.len() <= 100
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && s != "."
        && s != "..";

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidLogin(s.to_string()))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl InstallationStore for FileInstallationStore {
    async fn add_installation(&self, record: InstallationRecord) -> Result<()> {
        let path = self.account_dir(&record.login)?.join(INSTALLATION_FILE);
        let bytes = serde_json::to_vec_pretty(&record)?;

        let _guard = self.write_lock.lock().await;
        write_atomic(&path, &bytes)?;
        debug!(login = %record.login, path = %path.display(), "Wrote installation");
        Ok(())
    }

    async fn add_repos(&self, login: &Login, repos: Vec<GithubRepo>) -> Result<()> {
        let path = self.account_dir(login)?.join(REPOS_FILE);
        let bytes = serde_json::to_vec_pretty(&repos)?;

        let _guard = self.write_lock.lock().await;
        write_atomic(&path, &bytes)?;
        debug!(login = %login, count = repos.len(), "Wrote repositories");
        Ok(())
    }

    async fn delete_installation(&self, login: &Login) -> Result<()> {
        let dir = self.account_dir(login)?;

        let _guard = self.write_lock.lock().await;
        let removed_installation = remove_if_exists(&dir.join(INSTALLATION_FILE))?;
        let removed_repos = remove_if_exists(&dir.join(REPOS_FILE))?;

        if removed_installation || removed_repos {
            fsync_dir(&dir)?;
        }
        debug!(login = %login, removed_installation, removed_repos, "Deleted installation");
        Ok(())
    }

    async fn installation(&self, login: &Login) -> Result<Option<InstallationRecord>> {
        read_json(&self.account_dir(login)?.join(INSTALLATION_FILE))
    }

    async fn repos(&self, login: &Login) -> Result<Vec<GithubRepo>> {
        Ok(read_json(&self.account_dir(login)?.join(REPOS_FILE))?.unwrap_or_default())
    }
}
