//! Route registration for API callbacks.
//!
//! An [`ApiRouter`] binds paths to callbacks and runs every request through
//! [`execute_wrapped`]. How a callback is invoked is up to the router's
//! [`CallbackExecutor`]: public routes pass the request straight through,
//! private routes resolve the signed-in user first.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Bytes, to_bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::CookieJar;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{instrument, warn};

use super::envelope::{ApiResponse, NOT_SIGNED_IN};
use super::users::UserStore;
use super::wrapper::{AxumSink, RouteOptions, execute_wrapped};
use crate::BoxError;
use crate::types::UserRecord;

/// Largest request body an API route accepts.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// A buffered API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    body: Option<Bytes>,
}

impl ApiRequest {
    /// Builds a request. An empty body counts as no body.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        ApiRequest {
            method,
            uri,
            headers,
            body: (!body.is_empty()).then_some(body),
        }
    }

    async fn buffer(request: Request) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_BODY_BYTES).await?;
        Ok(ApiRequest::new(parts.method, parts.uri, parts.headers, bytes))
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Decodes the body as JSON. Returns `Ok(None)` when there is no body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.body
            .as_ref()
            .map(|bytes| serde_json::from_slice(bytes))
            .transpose()
    }

    /// Returns the value of the named request cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        CookieJar::from_headers(&self.headers)
            .get(name)
            .map(|c| c.value().to_string())
    }
}

pub type CallbackFuture = BoxFuture<'static, Result<ApiResponse, BoxError>>;

/// Callback for a route anyone may call.
pub type PublicCallback = Arc<dyn Fn(ApiRequest) -> CallbackFuture + Send + Sync>;

/// Callback for a route that needs a signed-in user.
pub type PrivateCallback = Arc<dyn Fn(ApiRequest, UserRecord) -> CallbackFuture + Send + Sync>;

/// Invokes a route's callback for one request.
#[async_trait]
pub trait CallbackExecutor: Send + Sync + 'static {
    type Callback: Clone + Send + Sync + 'static;

    async fn execute(
        &self,
        callback: &Self::Callback,
        request: ApiRequest,
    ) -> Result<ApiResponse, BoxError>;
}

/// Passes the request straight to the callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicExecutor;

#[async_trait]
impl CallbackExecutor for PublicExecutor {
    type Callback = PublicCallback;

    async fn execute(
        &self,
        callback: &PublicCallback,
        request: ApiRequest,
    ) -> Result<ApiResponse, BoxError> {
        callback(request).await
    }
}

/// Resolves the signed-in user before invoking the callback.
///
/// Requests without a session get `401 not-signed-in` and never reach the
/// callback.
pub struct PrivateExecutor {
    users: Arc<dyn UserStore>,
}

impl PrivateExecutor {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        PrivateExecutor { users }
    }
}

#[async_trait]
impl CallbackExecutor for PrivateExecutor {
    type Callback = PrivateCallback;

    async fn execute(
        &self,
        callback: &PrivateCallback,
        request: ApiRequest,
    ) -> Result<ApiResponse, BoxError> {
        match self.users.get_login_from_request(&request).await? {
            Some(user) => callback(request, user).await,
            None => Ok(ApiResponse::error(
                StatusCode::UNAUTHORIZED,
                NOT_SIGNED_IN,
                "You must be signed in to use this API.",
            )),
        }
    }
}

impl std::fmt::Debug for PrivateExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateExecutor").finish_non_exhaustive()
    }
}

/// Builds an axum [`Router`] of wrapped API callbacks.
pub struct ApiRouter<X: CallbackExecutor> {
    executor: Arc<X>,
    router: Router,
}

impl<X: CallbackExecutor> ApiRouter<X> {
    pub fn new(executor: X) -> Self {
        ApiRouter {
            executor: Arc::new(executor),
            router: Router::new(),
        }
    }

    /// Registers a GET route. GET routes never require a body.
    pub fn get(self, path: &str, callback: X::Callback) -> Self {
        let handler = self.handler(callback, RouteOptions::default());
        let router = self.router.route(path, get(handler));
        ApiRouter { router, ..self }
    }

    pub fn post(self, path: &str, callback: X::Callback, options: RouteOptions) -> Self {
        let handler = self.handler(callback, options);
        let router = self.router.route(path, post(handler));
        ApiRouter { router, ..self }
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    fn handler(
        &self,
        callback: X::Callback,
        options: RouteOptions,
    ) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
        let executor = Arc::clone(&self.executor);
        move |request: Request| -> BoxFuture<'static, Response> {
            let executor = Arc::clone(&executor);
            let callback = callback.clone();
            Box::pin(async move { serve(executor.as_ref(), &callback, options, request).await })
        }
    }
}

#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
async fn serve<X: CallbackExecutor>(
    executor: &X,
    callback: &X::Callback,
    options: RouteOptions,
    request: Request,
) -> Response {
    let request = match ApiRequest::buffer(request).await {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "Failed to read request body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                axum::Json(json!({
                    "code": "unreadable-body",
                    "message": "The request body could not be read.",
                })),
            )
                .into_response();
        }
    };

    let mut sink = AxumSink::new();
    let has_body = request.has_body();
    execute_wrapped(&mut sink, options, has_body, || {
        executor.execute(callback, request)
    })
    .await;
    sink.into_response()
}

/// Wraps a plain async function as a [`PublicCallback`].
pub fn public_callback<F, Fut>(f: F) -> PublicCallback
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ApiResponse, BoxError>> + Send + 'static,
{
    Arc::new(move |request: ApiRequest| -> CallbackFuture { Box::pin(f(request)) })
}

/// Wraps a plain async function as a [`PrivateCallback`].
pub fn private_callback<F, Fut>(f: F) -> PrivateCallback
where
    F: Fn(ApiRequest, UserRecord) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ApiResponse, BoxError>> + Send + 'static,
{
    Arc::new(move |request: ApiRequest, user: UserRecord| -> CallbackFuture {
        Box::pin(f(request, user))
    })
}
