//! Route layers that enforce RBAC.
//!
//! ```ignore
//! use axum::middleware::from_fn_with_state;
//! use uac_auth::middleware::{PermissionGate, require_permission};
//!
//! let users = Router::new()
//!     .route("/users", get(list_users))
//!     .layer(from_fn_with_state(
//!         PermissionGate::new(auth_state.clone(), "user", "read"),
//!         require_permission,
//!     ));
//! ```

use axum::extract::{FromRef, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AuthError;

use super::auth::{AuthState, BearerAuth};

/// State for [`require_permission`].
#[derive(Clone)]
pub struct PermissionGate {
    auth: AuthState,
    resource: String,
    action: String,
}

impl PermissionGate {
    pub fn new(auth: AuthState, resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            auth,
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl FromRef<PermissionGate> for AuthState {
    fn from_ref(gate: &PermissionGate) -> Self {
        gate.auth.clone()
    }
}

/// State for [`require_role`].
#[derive(Clone)]
pub struct RoleGate {
    auth: AuthState,
    role: String,
}

impl RoleGate {
    pub fn new(auth: AuthState, role: impl Into<String>) -> Self {
        Self {
            auth,
            role: role.into(),
        }
    }
}

impl FromRef<RoleGate> for AuthState {
    fn from_ref(gate: &RoleGate) -> Self {
        gate.auth.clone()
    }
}

/// Passes the request on when the bearer's user holds `resource:action`.
///
/// The [`AuthContext`](super::AuthContext) is placed in request extensions.
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    BearerAuth(auth): BearerAuth,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let allowed = gate
        .auth
        .rbac
        .check_permission(&auth.user_id, &gate.resource, &gate.action)
        .await?;

    if !allowed {
        tracing::debug!(
            user_id = %auth.user_id,
            resource = %gate.resource,
            action = %gate.action,
            "Permission denied"
        );
        return Err(AuthError::forbidden(format!(
            "Missing permission {}:{}",
            gate.resource, gate.action
        )));
    }

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Passes the request on when the bearer's user holds the role.
pub async fn require_role(
    State(gate): State<RoleGate>,
    BearerAuth(auth): BearerAuth,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !gate.auth.rbac.has_role(&auth.user_id, &gate.role).await? {
        tracing::debug!(user_id = %auth.user_id, role = %gate.role, "Role required");
        return Err(AuthError::forbidden(format!("Missing role {}", gate.role)));
    }

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}
