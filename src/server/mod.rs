//! HTTP server for the dashboard backend.
//!
//! # Endpoints
//!
//! - `POST /api/webhook` - Verifies GitHub deliveries and dispatches them to listeners
//! - `POST /api/settings/orgs.json` - Organization webhook settings (signed-in users)
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api::{SettingsApi, UserStore};
use crate::config::Config;
use crate::github::GitHubClient;
use crate::store::InstallationStore;
use crate::webhooks::{InstallationListener, WebhooksController};

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to the webhook and health handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// The listener registry deliveries are dispatched through.
    webhooks: Arc<WebhooksController>,

    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,
}

impl AppState {
    pub fn new(webhooks: Arc<WebhooksController>, webhook_secret: impl Into<Vec<u8>>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhooks,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn webhooks(&self) -> &WebhooksController {
        &self.inner.webhooks
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
///
/// `settings` holds the routes mounted under `/api/settings`.
pub fn build_router(app_state: AppState, settings: Router) -> Router {
    Router::new()
        .route("/api/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
        .nest("/api/settings", settings)
        .layer(TraceLayer::new_for_http())
}

/// Collaborators the server is assembled from.
pub struct Services {
    pub github: Arc<dyn GitHubClient>,
    pub store: Arc<dyn InstallationStore>,
    pub users: Arc<dyn UserStore>,
}

/// Wires the listener registry, its listeners and the API into one router.
pub fn build_app(config: &Config, services: Services) -> Router {
    let webhooks = Arc::new(WebhooksController::new());
    webhooks.add_listener(
        InstallationListener::EVENTS,
        Arc::new(InstallationListener::new(
            Arc::clone(&services.github),
            services.store,
            config.gql_token.clone(),
        )),
    );

    let settings = Arc::new(SettingsApi::new(services.github, config.webhook_url.clone()))
        .routes(services.users);

    build_router(AppState::new(webhooks, config.webhook_secret.clone()), settings)
}
