//! Server configuration from environment variables.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `PR_DASH_BIND_ADDR` | no | `0.0.0.0:3000` |
//! | `PR_DASH_WEBHOOK_SECRET` | yes | |
//! | `PR_DASH_GQL_TOKEN` | yes | |
//! | `PR_DASH_WEBHOOK_URL` | yes | |
//! | `PR_DASH_STATE_DIR` | no | in-memory store |

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,

    /// Secret GitHub signs webhook deliveries with.
    pub webhook_secret: Vec<u8>,

    /// Token for the app's own GraphQL lookups.
    pub gql_token: String,

    /// Public URL of this server's webhook endpoint, as registered on
    /// organizations.
    pub webhook_url: String,

    /// Where installations are persisted. `None` keeps them in memory.
    pub state_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let bind_addr = var("PR_DASH_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "PR_DASH_BIND_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Config {
            bind_addr,
            webhook_secret: required("PR_DASH_WEBHOOK_SECRET")?.into_bytes(),
            gql_token: required("PR_DASH_GQL_TOKEN")?,
            webhook_url: required("PR_DASH_WEBHOOK_URL")?,
            state_dir: var("PR_DASH_STATE_DIR").map(PathBuf::from),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("webhook_secret", &"<redacted>")
            .field("gql_token", &"<redacted>")
            .field("webhook_url", &self.webhook_url)
            .field("state_dir", &self.state_dir)
            .finish()
    }
}
