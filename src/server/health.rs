//! Liveness endpoint.

use axum::http::StatusCode;

/// Health check handler.
///
/// Returns 200 OK with the text "OK" as long as the server accepts
/// connections. It does not touch GitHub or the store.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
