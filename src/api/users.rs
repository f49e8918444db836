//! Session-to-user resolution for private routes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::router::ApiRequest;
use crate::BoxError;
use crate::types::UserRecord;

/// Name of the cookie carrying the session ID.
pub const SESSION_COOKIE: &str = "id";

/// Resolves the signed-in user for a request.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the user owning the request's session, or `None` when the
    /// request carries no valid session.
    async fn get_login_from_request(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<UserRecord>, BoxError>;
}

/// Sessions held in memory, keyed by the [`SESSION_COOKIE`] value.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    sessions: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_session(&self, session_id: impl Into<String>, user: UserRecord) {
        self.sessions.write().await.insert(session_id.into(), user);
    }

    pub async fn remove_session(&self, session_id: &str) -> Option<UserRecord> {
        self.sessions.write().await.remove(session_id)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_login_from_request(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<UserRecord>, BoxError> {
        let Some(session_id) = request.cookie(SESSION_COOKIE) else {
            trace!("Request has no session cookie");
            return Ok(None);
        };
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::new_fake_user_record;
    use axum::body::Bytes;
    use axum::http::header::COOKIE;
    use axum::http::{HeaderMap, Method, Uri};

    fn request_with_cookie(cookie: Option<&str>) -> ApiRequest {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, cookie.parse().unwrap());
        }
        ApiRequest::new(Method::GET, Uri::from_static("/"), headers, Bytes::new())
    }

    #[tokio::test]
    async fn resolves_known_session() {
        let store = InMemoryUserStore::new();
        store.add_session("s1", new_fake_user_record()).await;

        let user = store
            .get_login_from_request(&request_with_cookie(Some("id=s1")))
            .await
            .unwrap();
        assert_eq!(user, Some(new_fake_user_record()));
    }

    #[tokio::test]
    async fn unknown_or_missing_session_is_none() {
        let store = InMemoryUserStore::new();
        store.add_session("s1", new_fake_user_record()).await;

        for cookie in [None, Some("id=other"), Some("session=s1")] {
            let user = store
                .get_login_from_request(&request_with_cookie(cookie))
                .await
                .unwrap();
            assert_eq!(user, None, "cookie {cookie:?}");
        }
    }

    #[tokio::test]
    async fn removed_session_no_longer_resolves() {
        let store = InMemoryUserStore::new();
        store.add_session("s1", new_fake_user_record()).await;
        assert!(store.remove_session("s1").await.is_some());

        let user = store
            .get_login_from_request(&request_with_cookie(Some("id=s1")))
            .await
            .unwrap();
        assert_eq!(user, None);
    }
}
