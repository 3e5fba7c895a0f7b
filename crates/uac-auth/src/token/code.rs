//! Authorization code records.

use serde::{Deserialize, Serialize};

use crate::oauth::pkce::PkceChallengeMethod;

/// Key prefix for authorization code records in the shared store.
pub const AUTH_CODE_PREFIX: &str = "auth_code:";

/// A pending authorization code grant.
///
/// Once `used` is set or `expires_at` has passed the code can never be
/// redeemed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The code value. Filled in by the token service on issue.
    #[serde(default)]
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<PkceChallengeMethod>,
    #[serde(default)]
    pub nonce: Option<String>,
    /// Expiry (unix seconds). Filled in by the token service on issue.
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub used: bool,
}

impl AuthorizationCode {
    /// A fresh, unissued record bound to client, user and redirect.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        user_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            code: String::new(),
            client_id: client_id.into(),
            user_id: user_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            code_challenge: None,
            code_challenge_method: None,
            nonce: None,
            expires_at: 0,
            used: false,
        }
    }

    #[must_use]
    pub fn with_pkce(mut self, challenge: String, method: PkceChallengeMethod) -> Self {
        self.code_challenge = Some(challenge);
        self.code_challenge_method = Some(method);
        self
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Returns `true` once `now` (unix seconds) reaches the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Store key for a code value.
    #[must_use]
    pub fn storage_key(code: &str) -> String {
        format!("{AUTH_CODE_PREFIX}{code}")
    }
}
