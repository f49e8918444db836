//! Callback execution wrapper.
//!
//! Runs one API callback and turns whatever it produces into exactly one
//! response write:
//!
//! | Situation | Wire response |
//! |-----------|---------------|
//! | response already written | nothing |
//! | body required but absent | `400 {code: "no-body"}`, callback not invoked |
//! | `ApiResponse::Error` | `status`, `{code, message}` |
//! | `ApiResponse::Success` | cookies, then `status`, `data` |
//! | callback returned `Err` or panicked | `500 {code: "uncaught-exception"}` |

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use axum::Json;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite as CookieSameSite};
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::envelope::{ApiResponse, CookieValue, NO_BODY, SameSite, UNCAUGHT_EXCEPTION};
use crate::BoxError;

const NO_BODY_MESSAGE: &str = "You must provide a request body for this API.";

/// Per-route options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOptions {
    /// Reject requests without a body before invoking the callback.
    pub require_body: bool,
}

impl RouteOptions {
    pub fn require_body() -> Self {
        RouteOptions { require_body: true }
    }
}

/// Where the wrapper writes its response.
pub trait ResponseSink {
    /// True once a response has been written to this sink.
    fn headers_sent(&self) -> bool;

    fn set_cookie(&mut self, name: &str, cookie: &CookieValue);

    fn send_json(&mut self, status: StatusCode, body: Value);
}

/// Runs `invoke` under the envelope protocol, writing the outcome to `sink`.
///
/// `invoke` is called at most once, and only after the precondition checks.
pub async fn execute_wrapped<S, F, Fut>(
    sink: &mut S,
    options: RouteOptions,
    has_body: bool,
    invoke: F,
) where
    S: ResponseSink + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ApiResponse, BoxError>>,
{
    if sink.headers_sent() {
        debug!("Response already sent, skipping callback");
        return;
    }

    if options.require_body && !has_body {
        sink.send_json(
            StatusCode::BAD_REQUEST,
            json!({ "code": NO_BODY, "message": NO_BODY_MESSAGE }),
        );
        return;
    }

    let outcome = AssertUnwindSafe(async move { invoke().await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(response)) => write_envelope(sink, response),
        Ok(Err(err)) => {
            error!(error = %err, "API callback failed");
            write_uncaught(sink, &err.to_string());
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(panic = %message, "API callback panicked");
            write_uncaught(sink, &message);
        }
    }
}

fn write_envelope<S: ResponseSink + ?Sized>(sink: &mut S, response: ApiResponse) {
    match response {
        ApiResponse::Error { status, error } => {
            sink.send_json(
                status,
                json!({ "code": error.code, "message": error.message }),
            );
        }
        ApiResponse::Success {
            status,
            data,
            cookies,
        } => {
            for (name, cookie) in cookies.iter().flatten() {
                sink.set_cookie(name, cookie);
            }
            sink.send_json(status, data);
        }
    }
}

fn write_uncaught<S: ResponseSink + ?Sized>(sink: &mut S, message: &str) {
    sink.send_json(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({
            "code": UNCAUGHT_EXCEPTION,
            "message": format!("An uncaught exception was thrown: {}", message),
        }),
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

/// A [`ResponseSink`] that builds an axum [`Response`].
#[derive(Debug, Default)]
pub struct AxumSink {
    cookies: Vec<HeaderValue>,
    response: Option<Response>,
}

impl AxumSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the sink, returning what was written.
    pub fn into_response(self) -> Response {
        match self.response {
            Some(response) => response,
            None => {
                warn!("No response was written");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl ResponseSink for AxumSink {
    fn headers_sent(&self) -> bool {
        self.response.is_some()
    }

    fn set_cookie(&mut self, name: &str, cookie: &CookieValue) {
        if self.headers_sent() {
            warn!(cookie = name, "Cookie set after response was sent");
            return;
        }

        let header = build_cookie(name, cookie).to_string();
        match HeaderValue::from_str(&header) {
            Ok(value) => self.cookies.push(value),
            Err(_) => warn!(cookie = name, "Cookie is not a valid header value, skipping"),
        }
    }

    fn send_json(&mut self, status: StatusCode, body: Value) {
        if self.headers_sent() {
            warn!(%status, "Response already sent, dropping second write");
            return;
        }

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        for cookie in self.cookies.drain(..) {
            headers.append(SET_COOKIE, cookie);
        }
        self.response = Some(response);
    }
}

fn build_cookie(name: &str, cookie: &CookieValue) -> Cookie<'static> {
    let options = &cookie.options;
    let mut builder = Cookie::build((name.to_string(), cookie.value.clone()))
        .http_only(options.http_only)
        .secure(options.secure);

    if let Some(path) = &options.path {
        builder = builder.path(path.clone());
    }
    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(max_age) = options.max_age {
        builder = builder.max_age(max_age);
    }
    if let Some(same_site) = options.same_site {
        builder = builder.same_site(match same_site {
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::None => CookieSameSite::None,
        });
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::envelope::CookieOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every sink operation in order.
    #[derive(Debug, Default)]
    struct RecordingSink {
        sent: bool,
        ops: Vec<String>,
        status: Option<StatusCode>,
        body: Option<Value>,
    }

    impl RecordingSink {
        fn already_sent() -> Self {
            RecordingSink {
                sent: true,
                ..Default::default()
            }
        }
    }

    impl ResponseSink for RecordingSink {
        fn headers_sent(&self) -> bool {
            self.sent
        }

        fn set_cookie(&mut self, name: &str, cookie: &CookieValue) {
            self.ops.push(format!("cookie {}={}", name, cookie.value));
        }

        fn send_json(&mut self, status: StatusCode, body: Value) {
            self.ops.push(format!("send {}", status.as_u16()));
            self.sent = true;
            self.status = Some(status);
            self.body = Some(body);
        }
    }

    async fn run(
        sink: &mut RecordingSink,
        options: RouteOptions,
        has_body: bool,
        result: Result<ApiResponse, BoxError>,
    ) -> usize {
        let calls = AtomicUsize::new(0);
        execute_wrapped(sink, options, has_body, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { result }
        })
        .await;
        calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn success_writes_status_and_data() {
        let mut sink = RecordingSink::default();
        let calls = run(
            &mut sink,
            RouteOptions::default(),
            false,
            Ok(ApiResponse::ok(json!({ "ok": true }))),
        )
        .await;

        assert_eq!(calls, 1);
        assert_eq!(sink.status, Some(StatusCode::OK));
        assert_eq!(sink.body, Some(json!({ "ok": true })));
        assert_eq!(sink.ops, vec!["send 200"]);
    }

    #[tokio::test]
    async fn error_writes_code_and_message() {
        let mut sink = RecordingSink::default();
        run(
            &mut sink,
            RouteOptions::default(),
            false,
            Ok(ApiResponse::error(StatusCode::NOT_FOUND, "not-found", "x")),
        )
        .await;

        assert_eq!(sink.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(sink.body, Some(json!({ "code": "not-found", "message": "x" })));
    }

    #[tokio::test]
    async fn cookies_are_set_before_body_in_order() {
        let mut sink = RecordingSink::default();
        let response = ApiResponse::ok(json!({}))
            .with_cookie("id", "abc", CookieOptions::default())
            .with_cookie("theme", "dark", CookieOptions::default());

        run(&mut sink, RouteOptions::default(), false, Ok(response)).await;

        assert_eq!(sink.ops, vec!["cookie id=abc", "cookie theme=dark", "send 200"]);
    }

    #[tokio::test]
    async fn missing_required_body_skips_callback() {
        let mut sink = RecordingSink::default();
        let calls = run(
            &mut sink,
            RouteOptions::require_body(),
            false,
            Ok(ApiResponse::ok(json!({}))),
        )
        .await;

        assert_eq!(calls, 0);
        assert_eq!(sink.status, Some(StatusCode::BAD_REQUEST));
        assert_eq!(sink.body.as_ref().unwrap()["code"], NO_BODY);
    }

    #[tokio::test]
    async fn present_body_satisfies_requirement() {
        let mut sink = RecordingSink::default();
        let calls = run(
            &mut sink,
            RouteOptions::require_body(),
            true,
            Ok(ApiResponse::ok(json!({}))),
        )
        .await;

        assert_eq!(calls, 1);
        assert_eq!(sink.status, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn callback_error_becomes_uncaught_exception() {
        let mut sink = RecordingSink::default();
        run(&mut sink, RouteOptions::default(), false, Err("boom".into())).await;

        assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        let body = sink.body.unwrap();
        assert_eq!(body["code"], UNCAUGHT_EXCEPTION);
        assert_eq!(body["message"], "An uncaught exception was thrown: boom");
    }

    async fn panicking_callback() -> Result<ApiResponse, BoxError> {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn callback_panic_becomes_uncaught_exception() {
        let mut sink = RecordingSink::default();
        execute_wrapped(&mut sink, RouteOptions::default(), false, panicking_callback).await;

        assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        let message = sink.body.unwrap()["message"].as_str().unwrap().to_string();
        assert!(message.contains("kaboom"), "{message}");
    }

    #[tokio::test]
    async fn already_sent_response_is_left_alone() {
        let mut sink = RecordingSink::already_sent();
        let calls = run(
            &mut sink,
            RouteOptions::require_body(),
            false,
            Ok(ApiResponse::ok(json!({}))),
        )
        .await;

        assert_eq!(calls, 0);
        assert!(sink.ops.is_empty());
    }

    #[test]
    fn axum_sink_attaches_cookies_to_response() {
        let mut sink = AxumSink::new();
        let options = CookieOptions {
            path: Some("/".to_string()),
            http_only: true,
            same_site: Some(SameSite::Lax),
            ..Default::default()
        };
        sink.set_cookie(
            "id",
            &CookieValue {
                value: "abc".to_string(),
                options,
            },
        );
        sink.send_json(StatusCode::CREATED, json!({}));

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("id=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn axum_sink_ignores_second_write() {
        let mut sink = AxumSink::new();
        sink.send_json(StatusCode::OK, json!(1));
        sink.send_json(StatusCode::INTERNAL_SERVER_ERROR, json!(2));

        assert_eq!(sink.into_response().status(), StatusCode::OK);
    }
}
