//! Signed-in dashboard users.

use serde::{Deserialize, Serialize};

/// A dashboard user, as resolved from a request's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub github_token: String,

    /// OAuth scopes granted to `github_token`.
    pub scopes: Vec<String>,

    pub avatar_url: Option<String>,
    pub fullname: Option<String>,
}

impl UserRecord {
    /// Returns true if every scope in `required` was granted.
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|s| s == scope))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::new_fake_user_record;

    #[test]
    fn has_scopes_requires_all() {
        let mut user = new_fake_user_record();
        user.scopes = vec!["read:org".to_string()];

        assert!(user.has_scopes(&["read:org"]));
        assert!(!user.has_scopes(&["read:org", "admin:org_hook"]));
        assert!(user.has_scopes(&[]));
    }
}
