//! Bearer token claims.

use serde::{Deserialize, Serialize};

/// Which credential a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential presented to resource endpoints.
    #[default]
    Access,
    /// Long-lived credential exchanged for a new access token.
    Refresh,
    /// OpenID Connect identity token.
    Id,
}

impl TokenKind {
    /// Returns the claim value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Id => "id",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token the service issues.
///
/// `iss`, `iat`, `exp`, `jti` and `type` are stamped by the token service;
/// callers fill in the subject and grant fields. `sub` is empty for
/// client-credentials tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user id.
    #[serde(default)]
    pub sub: String,

    /// User id, mirrors `sub`.
    #[serde(default)]
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Token kind.
    #[serde(rename = "type", default)]
    pub kind: TokenKind,

    /// Issuer.
    #[serde(default)]
    pub iss: String,

    /// Audience, only set on identity tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// OIDC nonce echoed into identity tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Issued at (unix seconds).
    #[serde(default)]
    pub iat: i64,

    /// Expiry (unix seconds).
    #[serde(default)]
    pub exp: i64,

    /// Unique token id.
    #[serde(default)]
    pub jti: String,
}

impl TokenClaims {
    /// Claims for a user-bound token.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            sub: user_id.clone(),
            uid: user_id,
            ..Self::default()
        }
    }

    /// Claims for a client-credentials token with no user subject.
    #[must_use]
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Returns `true` if the scope was granted.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Space-separated scope string, as used in OAuth responses.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Returns the user id, or `None` for client-credentials tokens.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        if self.sub.is_empty() {
            None
        } else {
            Some(&self.sub)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_as_type() {
        let claims = TokenClaims {
            kind: TokenKind::Refresh,
            ..TokenClaims::for_user("u1")
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["uid"], "u1");
        assert!(json.get("aud").is_none());
    }

    #[test]
    fn test_client_claims_have_no_user() {
        let claims = TokenClaims::for_client("app-1").with_scopes(vec!["read".into()]);
        assert_eq!(claims.user_id(), None);
        assert_eq!(claims.client_id.as_deref(), Some("app-1"));
        assert!(claims.has_scope("read"));
        assert_eq!(claims.scope_string(), "read");
    }
}
