//! Installation persistence.
//!
//! The dispatcher never touches storage; listeners do, through
//! [`InstallationStore`]. All writes are idempotent from the caller's point of
//! view: re-adding overwrites and deleting an unknown login succeeds.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{GithubRepo, InstallationRecord, Login};

mod file;
mod fsync;
mod memory;

pub use file::FileInstallationStore;
pub use memory::InMemoryInstallationStore;

/// Errors that can occur in a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A login that cannot be used as a storage key.
    #[error("invalid login for storage: {0:?}")]
    InvalidLogin(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence collaborator for installations and their repositories.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    /// Inserts or replaces the installation for `record.login`.
    async fn add_installation(&self, record: InstallationRecord) -> Result<()>;

    /// Replaces the repository collection for `login`.
    async fn add_repos(&self, login: &Login, repos: Vec<GithubRepo>) -> Result<()>;

    /// Removes the installation and repositories for `login`.
    async fn delete_installation(&self, login: &Login) -> Result<()>;

    async fn installation(&self, login: &Login) -> Result<Option<InstallationRecord>>;

    async fn repos(&self, login: &Login) -> Result<Vec<GithubRepo>>;
}
