//! Admin authentication extractor.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::error::AuthError;
use crate::rbac::{ROLE_ORG_ADMIN, ROLE_SUPER_ADMIN};

use super::auth::{AuthState, BearerAuth};
use super::types::AuthContext;

/// Roles that open the admin API.
pub const ADMIN_ROLES: &[&str] = &[ROLE_SUPER_ADMIN, ROLE_ORG_ADMIN];

/// A bearer-authenticated user holding `super_admin` or `org_admin`.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub auth: AuthContext,
    /// Active role codes of the user.
    pub roles: Vec<String>,
}

impl AdminAuth {
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_SUPER_ADMIN)
    }
}

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerAuth(auth) = BearerAuth::from_request_parts(parts, state).await?;

        if !auth.is_user_authenticated() {
            tracing::debug!("Admin access denied: client credentials token");
            return Err(AuthError::forbidden("Admin access requires user authentication"));
        }

        let auth_state = AuthState::from_ref(state);
        let roles: Vec<String> = auth_state
            .rbac
            .get_user_roles(&auth.user_id)
            .await?
            .into_iter()
            .filter(|role| role.is_active())
            .map(|role| role.code)
            .collect();

        if !roles.iter().any(|r| ADMIN_ROLES.contains(&r.as_str())) {
            tracing::debug!(user_id = %auth.user_id, roles = ?roles, "Admin access denied");
            return Err(AuthError::forbidden("Admin access required"));
        }

        Ok(Self { auth, roles })
    }
}
