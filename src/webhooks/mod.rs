//! Webhook handling for GitHub App events.
//!
//! - [`signature`]: HMAC-SHA256 verification of deliveries
//! - [`events`]: event type tags and payloads
//! - [`controller`]: the listener registry and dispatcher
//! - [`install`]: the installation lifecycle listener

pub mod controller;
pub mod events;
pub mod install;
pub mod listener;
pub mod signature;

pub use controller::{DispatchError, WebhooksController};
pub use events::{EventTypes, WebhookPayload, WebhookType};
pub use install::{InstallHook, InstallOutcome, InstallationListener, handle_github_app_install};
pub use listener::{NotificationSent, WebhookListener, WebhookListenerResponse};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
