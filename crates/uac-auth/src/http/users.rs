//! Per-user role assignment and account administration.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::middleware::{AdminAuth, BearerAuth};
use crate::rbac::ROLE_SUPER_ADMIN;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionsResponse {
    pub user_id: String,
    pub permissions: Vec<String>,
}

/// `POST /api/v1/users/{id}/roles`
///
/// Only a super admin may hand out `super_admin`.
pub async fn assign_role_handler(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(user_id): Path<String>,
    Json(request): Json<AssignRoleRequest>,
) -> Response {
    if request.role_code == ROLE_SUPER_ADMIN && !admin.is_super_admin() {
        tracing::warn!(admin = %admin.auth.user_id, user_id = %user_id, "super_admin assignment denied");
        return AuthError::forbidden("Only a super admin can assign super_admin").into_response();
    }

    match state.rbac.assign_role_by_code(&user_id, &request.role_code).await {
        Ok(()) => {
            tracing::info!(
                admin = %admin.auth.user_id,
                user_id = %user_id,
                role = %request.role_code,
                "Role assigned"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `DELETE /api/v1/users/{id}/roles/{role_id}`
pub async fn revoke_role_handler(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path((user_id, role_id)): Path<(String, String)>,
) -> Response {
    match state.rbac.revoke_role(&user_id, &role_id).await {
        Ok(()) => {
            tracing::info!(admin = %admin.auth.user_id, user_id = %user_id, role_id = %role_id, "Role revoked");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `GET /api/v1/users/{id}/roles`
pub async fn user_roles_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(user_id): Path<String>,
) -> Response {
    match state.rbac.get_user_roles(&user_id).await {
        Ok(roles) => Json(roles).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `GET /api/v1/users/{id}/permissions`
pub async fn user_permissions_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(user_id): Path<String>,
) -> Response {
    permissions_of(&state, user_id).await
}

/// `GET /api/v1/me/permissions`
pub async fn my_permissions_handler(
    State(state): State<AppState>,
    BearerAuth(auth): BearerAuth,
) -> Response {
    permissions_of(&state, auth.user_id).await
}

async fn permissions_of(state: &AppState, user_id: String) -> Response {
    match state.rbac.get_user_permissions(&user_id).await {
        Ok(permissions) => Json(PermissionsResponse {
            user_id,
            permissions,
        })
        .into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `POST /api/v1/users/{id}/unlock`
pub async fn unlock_handler(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(user_id): Path<String>,
) -> Response {
    match state.passwords.unlock_account(&user_id).await {
        Ok(()) => {
            tracing::info!(admin = %admin.auth.user_id, user_id = %user_id, "Account unlocked");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `POST /api/v1/users/{id}/password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(user_id): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Response {
    match state
        .passwords
        .reset_password(&user_id, &request.new_password)
        .await
    {
        Ok(()) => {
            tracing::info!(admin = %admin.auth.user_id, user_id = %user_id, "Password reset");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}
