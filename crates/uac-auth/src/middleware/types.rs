//! Authenticated request context.

use std::sync::Arc;

use crate::token::TokenClaims;

/// Identity extracted from a validated access token.
///
/// Inserted into request extensions by the permission and role gates, so
/// handlers behind them can take `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Empty for client-credentials tokens.
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    pub claims: Arc<TokenClaims>,
}

impl AuthContext {
    #[must_use]
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            username: claims.username.clone(),
            email: claims.email.clone(),
            client_id: claims.client_id.clone(),
            scopes: claims.scopes.clone(),
            claims: Arc::new(claims),
        }
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Returns `true` unless this is a client-credentials token.
    #[must_use]
    pub fn is_user_authenticated(&self) -> bool {
        !self.user_id.is_empty()
    }

    /// User id, falling back to the client id for service tokens.
    #[must_use]
    pub fn subject(&self) -> &str {
        if self.is_user_authenticated() {
            &self.user_id
        } else {
            self.client_id.as_deref().unwrap_or_default()
        }
    }
}
