//! The API response envelope.
//!
//! Every API callback answers with an [`ApiResponse`]: either an error with a
//! machine-readable code, or data plus optional cookies. The status code is
//! always explicit.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::Duration;

/// Error code for a route that requires a body but got none.
pub const NO_BODY: &str = "no-body";

/// Error code for a callback that failed or panicked.
pub const UNCAUGHT_EXCEPTION: &str = "uncaught-exception";

/// Error code for a private route called without a session.
pub const NOT_SIGNED_IN: &str = "not-signed-in";

/// Error body sent on the wire: `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Cookie `SameSite` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Options handed through to the transport's cookie mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

/// A cookie to set on a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieValue {
    pub value: String,
    pub options: CookieOptions,
}

/// Cookies in the order they are set.
pub type Cookies = Vec<(String, CookieValue)>;

/// The result of an API callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Error {
        status: StatusCode,
        error: ApiError,
    },
    Success {
        status: StatusCode,
        data: serde_json::Value,
        cookies: Option<Cookies>,
    },
}

impl ApiResponse {
    /// A 200 response carrying `data`.
    pub fn ok(data: serde_json::Value) -> Self {
        ApiResponse::data(StatusCode::OK, data)
    }

    pub fn data(status: StatusCode, data: serde_json::Value) -> Self {
        ApiResponse::Success {
            status,
            data,
            cookies: None,
        }
    }

    pub fn error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse::Error {
            status,
            error: ApiError::new(code, message),
        }
    }

    /// Adds a cookie to a success response. Error responses are unchanged.
    pub fn with_cookie(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        options: CookieOptions,
    ) -> Self {
        if let ApiResponse::Success { cookies, .. } = &mut self {
            cookies.get_or_insert_with(Vec::new).push((
                name.into(),
                CookieValue {
                    value: value.into(),
                    options,
                },
            ));
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiResponse::Error { status, .. } | ApiResponse::Success { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_cookie_keeps_insertion_order() {
        let response = ApiResponse::ok(json!({}))
            .with_cookie("b", "2", CookieOptions::default())
            .with_cookie("a", "1", CookieOptions::default());

        let ApiResponse::Success { cookies: Some(cookies), .. } = response else {
            panic!("expected success with cookies");
        };
        let names: Vec<_> = cookies.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn with_cookie_ignores_errors() {
        let response = ApiResponse::error(StatusCode::NOT_FOUND, "not-found", "x")
            .with_cookie("a", "1", CookieOptions::default());

        assert_eq!(
            response,
            ApiResponse::error(StatusCode::NOT_FOUND, "not-found", "x")
        );
    }

    #[test]
    fn status_reads_either_variant() {
        assert_eq!(ApiResponse::ok(json!(null)).status(), StatusCode::OK);
        assert_eq!(
            ApiResponse::error(StatusCode::IM_A_TEAPOT, "t", "t").status(),
            StatusCode::IM_A_TEAPOT
        );
    }
}
