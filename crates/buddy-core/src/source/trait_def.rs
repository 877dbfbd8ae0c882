//! Collaborator traits for the remote coursework tier.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::Assignment;

/// Failures from a coursework source. Both are tier failures to the
/// resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourseworkError {
    /// No credential, an expired one, or the upstream refused it.
    #[error("coursework access unauthorized: {0}")]
    Unauthorized(String),

    /// Network failure, timeout, or an unexpected upstream response.
    #[error("coursework source unreachable: {0}")]
    Unreachable(String),
}

/// A remote source of a user's assignments.
#[async_trait]
pub trait CourseworkSource: Send + Sync {
    /// Short name for logs (e.g. "classroom").
    fn name(&self) -> &str;

    /// Fetch every assignment visible to `user_id`.
    async fn fetch_assignments(&self, user_id: &str) -> Result<Vec<Assignment>, CourseworkError>;
}

// Compile-time assertion: CourseworkSource must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn CourseworkSource) {}
};

/// Lookup of a user's upstream access token.
///
/// Token acquisition, refresh and storage live outside this crate; this is
/// the only view the coursework client has of them.
#[async_trait]
pub trait AccessTokens: Send + Sync {
    /// Return a usable bearer token for `user_id`, or
    /// [`CourseworkError::Unauthorized`].
    async fn access_token(&self, user_id: &str) -> Result<String, CourseworkError>;
}

/// In-memory [`AccessTokens`]: a per-user map with an optional shared
/// default token.
#[derive(Default, Clone)]
pub struct StaticAccessTokens {
    tokens: HashMap<String, String>,
    default_token: Option<String>,
}

impl StaticAccessTokens {
    /// An empty token set; every lookup is unauthorized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `token` for any user without a specific entry.
    pub fn with_default(mut self, token: impl Into<String>) -> Self {
        self.default_token = Some(token.into());
        self
    }

    /// Register a token for one user.
    pub fn insert(&mut self, user_id: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(user_id.into(), token.into());
    }
}

impl std::fmt::Debug for StaticAccessTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAccessTokens")
            .field("users", &self.tokens.keys().collect::<Vec<_>>())
            .field("has_default", &self.default_token.is_some())
            .finish()
    }
}

#[async_trait]
impl AccessTokens for StaticAccessTokens {
    async fn access_token(&self, user_id: &str) -> Result<String, CourseworkError> {
        self.tokens
            .get(user_id)
            .or(self.default_token.as_ref())
            .filter(|t| !t.is_empty())
            .cloned()
            .ok_or_else(|| CourseworkError::Unauthorized("no_access_token".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_tokens_prefer_user_entry() {
        let mut tokens = StaticAccessTokens::new().with_default("shared");
        tokens.insert("u1", "mine");
        assert_eq!(tokens.access_token("u1").await.unwrap(), "mine");
        assert_eq!(tokens.access_token("u2").await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let tokens = StaticAccessTokens::new();
        let err = tokens.access_token("u1").await.unwrap_err();
        assert!(matches!(err, CourseworkError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn empty_token_is_unauthorized() {
        let tokens = StaticAccessTokens::new().with_default("");
        assert!(tokens.access_token("u1").await.is_err());
    }

    #[test]
    fn debug_hides_token_values() {
        let mut tokens = StaticAccessTokens::new().with_default("secret-default");
        tokens.insert("u1", "secret-user");
        let debug = format!("{tokens:?}");
        assert!(debug.contains("u1"));
        assert!(!debug.contains("secret"));
    }
}
