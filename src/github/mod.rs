//! GitHub API access.
//!
//! - [`GitHubClient`]: GraphQL query + REST `GET`, one token per call
//! - [`OctocrabClient`]: the octocrab-backed implementation
//! - [`batch`]: many repository lookups folded into one aliased GraphQL query

pub mod batch;
mod client;
mod error;

pub use batch::{BatchError, BatchedQuery, fetch_repos, repo_lookup_query};
pub use client::{FetchPolicy, GitHubClient, OctocrabClient};
pub use error::{GitHubApiError, GitHubErrorKind};
