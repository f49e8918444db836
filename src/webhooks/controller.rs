//! Event registry and dispatcher.
//!
//! The controller maps each [`WebhookType`] to the listeners subscribed to it
//! and fans incoming events out to them.
//!
//! # Delivery
//!
//! Listeners for an event run one at a time, in registration order, each
//! awaited before the next starts. Listeners therefore never interleave side
//! effects for the same event. The first listener error stops delivery: later
//! listeners are not invoked and no partial result is returned.
//!
//! # Consistency
//!
//! Each dispatch works on a snapshot of the listener list taken when it
//! starts. Listeners added or removed while a dispatch is in flight only
//! affect later dispatches.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use super::events::{EventTypes, WebhookPayload, WebhookType};
use super::listener::{WebhookListener, WebhookListenerResponse};
use crate::BoxError;

/// Errors that can occur during dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A listener failed; listeners after it were skipped.
    #[error("listener #{position} failed handling {event} event: {source}")]
    Listener {
        event: WebhookType,
        /// Zero-based position of the failing listener in delivery order.
        position: usize,
        #[source]
        source: BoxError,
    },
}

type ListenerList = Vec<Arc<dyn WebhookListener>>;

/// Registry of webhook listeners keyed by event type.
#[derive(Default)]
pub struct WebhooksController {
    listeners: RwLock<HashMap<WebhookType, ListenerList>>,
}

/// Two registrations are the same listener iff they share an allocation.
fn same_listener(a: &Arc<dyn WebhookListener>, b: &Arc<dyn WebhookListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl WebhooksController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to one or more event types.
    ///
    /// Adding a listener that is already subscribed to a type has no effect
    /// for that type.
    pub fn add_listener(&self, events: impl Into<EventTypes>, listener: Arc<dyn WebhookListener>) {
        let EventTypes(kinds) = events.into();
        let mut map = self.listeners.write().unwrap_or_else(PoisonError::into_inner);

        for kind in kinds {
            let list = map.entry(kind).or_default();
            if list.iter().any(|l| same_listener(l, &listener)) {
                trace!(event = %kind, "Listener already subscribed");
                continue;
            }
            list.push(Arc::clone(&listener));
            debug!(event = %kind, listeners = list.len(), "Listener subscribed");
        }
    }

    /// Unsubscribes `listener` from every event type.
    ///
    /// Does nothing if it was never added.
    pub fn remove_listener(&self, listener: &Arc<dyn WebhookListener>) {
        let mut map = self.listeners.write().unwrap_or_else(PoisonError::into_inner);

        map.retain(|kind, list| {
            let before = list.len();
            list.retain(|l| !same_listener(l, listener));
            if list.len() != before {
                debug!(event = %kind, "Listener unsubscribed");
            }
            !list.is_empty()
        });
    }

    /// Returns how many listeners are subscribed to `kind`.
    pub fn listener_count(&self, kind: WebhookType) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    fn snapshot(&self, kind: WebhookType) -> ListenerList {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Delivers `payload` to every listener subscribed to its type.
    ///
    /// Returns the non-empty listener responses in delivery order. An event
    /// type with no subscribers yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns the first listener error. Listeners after the failing one are
    /// not invoked.
    #[instrument(skip(self, payload), fields(event = %payload.kind))]
    pub async fn handle_webhook_event(
        &self,
        payload: &WebhookPayload,
    ) -> Result<Vec<WebhookListenerResponse>, DispatchError> {
        let listeners = self.snapshot(payload.kind);
        if listeners.is_empty() {
            debug!("No listeners subscribed");
            return Ok(Vec::new());
        }

        let mut responses = Vec::new();
        for (position, listener) in listeners.iter().enumerate() {
            match listener.handle_webhook_event(payload).await {
                Ok(Some(response)) => {
                    trace!(position, id = %response.id, "Listener responded");
                    responses.push(response);
                }
                Ok(None) => trace!(position, "Listener had nothing to report"),
                Err(source) => {
                    warn!(position, error = %source, "Listener failed, aborting delivery");
                    return Err(DispatchError::Listener {
                        event: payload.kind,
                        position,
                        source,
                    });
                }
            }
        }

        debug!(
            listeners = listeners.len(),
            responses = responses.len(),
            "Event delivered"
        );
        Ok(responses)
    }
}

impl std::fmt::Debug for WebhooksController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> = map.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("WebhooksController")
            .field("listeners", &counts)
            .finish()
    }
}
