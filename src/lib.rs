//! PR Dashboard backend - GitHub App webhooks and the dashboard's JSON API.
//!
//! This library provides the webhook registry and dispatcher, the API
//! callback envelope, batched GitHub lookups and installation persistence.

pub mod api;
pub mod config;
pub mod github;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;

/// Error type crossing listener and callback boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
