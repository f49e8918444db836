//! The listener capability and its response type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::events::WebhookPayload;
use crate::BoxError;

/// A notification sent as a side effect of handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSent {
    /// Login of the user notified.
    pub recipient: String,
    pub summary: String,
}

/// What a listener reports back after handling an event.
///
/// The dispatcher does not look inside; it only collects and forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookListenerResponse {
    pub id: String,
    pub notifications: Vec<NotificationSent>,
}

impl WebhookListenerResponse {
    pub fn new(id: impl Into<String>) -> Self {
        WebhookListenerResponse {
            id: id.into(),
            notifications: Vec::new(),
        }
    }
}

/// A subscriber to webhook events.
///
/// Listeners are registered as `Arc<dyn WebhookListener>` and identified by
/// that pointer, so registering the same `Arc` twice is a no-op.
#[async_trait]
pub trait WebhookListener: Send + Sync {
    /// Handles one event. `Ok(None)` means "nothing to report".
    ///
    /// An `Err` aborts delivery of this event to any listener registered
    /// after this one.
    async fn handle_webhook_event(
        &self,
        payload: &WebhookPayload,
    ) -> Result<Option<WebhookListenerResponse>, BoxError>;
}
