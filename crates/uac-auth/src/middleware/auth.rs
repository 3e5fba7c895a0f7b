//! Bearer token extractors.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use uac_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn whoami(BearerAuth(auth): BearerAuth) -> String {
//!     auth.subject().to_string()
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .with_state(auth_state);
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AuthError;
use crate::rbac::RbacEngine;
use crate::token::{TokenKind, TokenService};

use super::types::AuthContext;

// =============================================================================
// Auth State
// =============================================================================

/// Services the extractors and gates need.
///
/// Include it in the application state and expose it through `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenService>,
    pub rbac: Arc<dyn RbacEngine>,
}

impl AuthState {
    pub fn new(tokens: Arc<dyn TokenService>, rbac: Arc<dyn RbacEngine>) -> Self {
        Self { tokens, rbac }
    }

    /// Validates a raw bearer token and requires it to be an access token.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.tokens.validate(token).await.map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AuthError::from(e)
        })?;

        if claims.kind != TokenKind::Access {
            tracing::debug!(kind = %claims.kind, jti = %claims.jti, "Non-access token presented");
            return Err(AuthError::invalid_token("Not an access token"));
        }

        Ok(AuthContext::from_claims(claims))
    }
}

/// Token from `Authorization: Bearer <token>`. The scheme is case-insensitive.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// Rejects with 401 unless the request carries a valid access token.
pub struct BearerAuth(pub AuthContext);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AuthError::unauthorized("Missing bearer token"))?;
        let auth = auth_state.authenticate(token).await?;

        tracing::debug!(
            subject = %auth.subject(),
            client_id = auth.client_id.as_deref().unwrap_or_default(),
            "Bearer token accepted"
        );
        Ok(BearerAuth(auth))
    }
}

// =============================================================================
// Optional Bearer Auth Extractor
// =============================================================================

/// Like [`BearerAuth`], but yields `None` instead of rejecting.
pub struct OptionalBearerAuth(pub Option<AuthContext>);

impl<S> FromRequestParts<S> for OptionalBearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(OptionalBearerAuth(None));
        };
        let auth_state = AuthState::from_ref(state);
        Ok(OptionalBearerAuth(auth_state.authenticate(token).await.ok()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::AuthState;
    use crate::rbac::{MemoryRbacStorage, RbacEngine, RbacService};
    use crate::store::MemoryStore;
    use crate::token::jwt::SigningKeyPair;
    use crate::token::service::TokenConfig;
    use crate::token::{JwtService, JwtTokenService};

    pub(crate) const ISSUER: &str = "https://auth.example.com";

    pub(crate) async fn auth_state() -> AuthState {
        let jwt = JwtService::new(SigningKeyPair::generate_rsa().unwrap(), ISSUER);
        let tokens = JwtTokenService::new(jwt, Arc::new(MemoryStore::new()), TokenConfig::new(ISSUER));
        let rbac = RbacService::with_storage(Arc::new(MemoryRbacStorage::new()));
        rbac.init_default_roles_and_permissions().await.unwrap();
        AuthState::new(Arc::new(tokens), Arc::new(rbac))
    }
}
