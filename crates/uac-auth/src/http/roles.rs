//! Role and permission administration.
//!
//! Mounted behind `require_permission` on the `role` resource.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::AuthError;
use crate::rbac::{Permission, RbacError, Role, RoleStatus};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrgFilter {
    #[serde(default)]
    pub org_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Permission codes.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Partial role update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionsRequest {
    pub permission_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
}

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Query(filter): Query<OrgFilter>,
) -> Response {
    match state.rbac.list_roles(filter.org_id.as_deref()).await {
        Ok(roles) => Json(roles).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> Response {
    if request.code.trim().is_empty() || request.name.trim().is_empty() {
        return AuthError::invalid_request("code and name are required").into_response();
    }

    let mut role = Role::new(request.code, request.name);
    role.description = request.description;
    role.org_id = request.org_id;
    role.permissions.extend(request.permissions);

    match state.rbac.create_role(role).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn get_role_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.rbac.get_role(&id).await {
        Ok(role) => Json(role).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> Response {
    let mut role = match state.rbac.get_role(&id).await {
        Ok(role) => role,
        Err(e) => return AuthError::from(e).into_response(),
    };

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return AuthError::invalid_request("name must not be empty").into_response();
        }
        role.name = name;
    }
    if let Some(description) = request.description {
        role.description = Some(description);
    }
    if let Some(status) = request.status {
        role.status = status;
    }

    match state.rbac.update_role(role).await {
        Ok(role) => Json(role).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.rbac.delete_role(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Query(filter): Query<OrgFilter>,
) -> Response {
    match state.rbac.list_permissions(filter.org_id.as_deref()).await {
        Ok(permissions) => Json(permissions).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn create_permission_handler(
    State(state): State<AppState>,
    Json(request): Json<CreatePermissionRequest>,
) -> Response {
    if request.resource.trim().is_empty() || request.action.trim().is_empty() {
        return AuthError::invalid_request("resource and action are required").into_response();
    }

    let mut permission = Permission::new(request.resource, request.action);
    permission.description = request.description;
    permission.org_id = request.org_id;

    match state.rbac.create_permission(permission).await {
        Ok(permission) => (StatusCode::CREATED, Json(permission)).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn get_permission_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.rbac.get_permission(&id).await {
        Ok(permission) => Json(permission).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn delete_permission_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.rbac.delete_permission(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// Permissions granted by one role, resolved from its codes.
pub async fn role_permissions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let result = async {
        let role = state.rbac.get_role(&id).await?;
        let permissions = state.rbac.list_permissions(None).await?;
        Ok::<_, RbacError>(
            permissions
                .into_iter()
                .filter(|p| role.permissions.contains(&p.code))
                .collect::<Vec<_>>(),
        )
    }
    .await;

    match result {
        Ok(permissions) => Json(permissions).into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn add_role_permissions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RolePermissionsRequest>,
) -> Response {
    match state
        .rbac
        .add_permissions_to_role(&id, &request.permission_ids)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

pub async fn remove_role_permissions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RolePermissionsRequest>,
) -> Response {
    match state
        .rbac
        .remove_permissions_from_role(&id, &request.permission_ids)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}
