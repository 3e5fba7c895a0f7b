//! Axum routes for the auth center.
//!
//! # Routes
//!
//! | Method | Path | Guard |
//! |--------|------|-------|
//! | GET | `/oauth/authorize` | session cookie or bearer, optional |
//! | POST | `/oauth/token` | client credentials per grant |
//! | POST | `/oauth/revoke` | |
//! | POST | `/oauth/introspect` | |
//! | GET, POST | `/oauth/userinfo` | bearer |
//! | GET | `/.well-known/openid-configuration` | |
//! | GET | `/.well-known/jwks.json` | |
//! | POST | `/cas/tickets` | TGT in body |
//! | GET | `/cas/serviceValidate` | |
//! | DELETE | `/cas/tickets/{tgt}` | |
//! | POST | `/api/v1/auth/login` | |
//! | POST | `/api/v1/auth/refresh` | refresh token in body |
//! | POST | `/api/v1/auth/logout` | bearer |
//! | GET | `/api/v1/auth/me` | bearer |
//! | POST | `/api/v1/auth/password` | bearer |
//! | GET | `/api/v1/me/permissions` | bearer |
//! | GET, POST | `/api/v1/roles` | `role:read` / `role:write` |
//! | GET, PUT, DELETE | `/api/v1/roles/{id}` | `role:read` / `role:write` / `role:delete` |
//! | GET, POST, DELETE | `/api/v1/roles/{id}/permissions` | `role:read` / `role:write` / `role:write` |
//! | GET, POST | `/api/v1/permissions` | `role:read` / `role:write` |
//! | GET, DELETE | `/api/v1/permissions/{id}` | `role:read` / `role:delete` |
//! | GET, POST | `/api/v1/users/{id}/roles` | admin |
//! | DELETE | `/api/v1/users/{id}/roles/{role_id}` | admin |
//! | GET | `/api/v1/users/{id}/permissions` | admin |
//! | POST | `/api/v1/users/{id}/unlock` | admin |
//! | POST | `/api/v1/users/{id}/password` | admin |
//! | GET | `/healthz` | |

pub mod auth;
pub mod cas;
pub mod oauth;
pub mod roles;
pub mod users;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::account::{AccountStorage, PasswordAuthenticator};
use crate::cas::TicketEngine;
use crate::config::AuthConfig;
use crate::middleware::{AuthState, PermissionGate, require_permission};
use crate::oauth::ProtocolHandler;
use crate::rbac::RbacEngine;
use crate::rbac::model::{ACTION_DELETE, ACTION_READ, ACTION_WRITE, RESOURCE_ROLE};
use crate::token::TokenService;

pub use auth::{LoginRequest, LoginResponse, change_password_handler, login_handler};
pub use cas::{create_ticket_handler, logout_handler, service_validate_handler};
pub use oauth::{
    authorize_handler, discovery_handler, introspect_handler, jwks_handler, revoke_handler,
    token_handler, userinfo_handler,
};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<dyn TokenService>,
    pub oauth: Arc<dyn ProtocolHandler>,
    pub cas: Arc<dyn TicketEngine>,
    pub rbac: Arc<dyn RbacEngine>,
    pub accounts: Arc<dyn AccountStorage>,
    pub passwords: Arc<PasswordAuthenticator>,
    pub cookie_name: String,
    pub secure_cookie: bool,
}

impl AppState {
    pub fn new(
        config: &AuthConfig,
        tokens: Arc<dyn TokenService>,
        oauth: Arc<dyn ProtocolHandler>,
        cas: Arc<dyn TicketEngine>,
        rbac: Arc<dyn RbacEngine>,
        accounts: Arc<dyn AccountStorage>,
    ) -> Self {
        let passwords = Arc::new(PasswordAuthenticator::new(
            accounts.clone(),
            config.lockout.clone(),
        ));
        Self {
            tokens,
            oauth,
            cas,
            rbac,
            accounts,
            passwords,
            cookie_name: config.cas.cookie_name.clone(),
            secure_cookie: config.cas.secure_cookie,
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        AuthState::new(state.tokens.clone(), state.rbac.clone())
    }
}

/// Builds the full router.
pub fn router(state: AppState) -> Router {
    let auth = AuthState::from_ref(&state);
    let guarded = |method: MethodRouter<AppState>, action: &str| -> MethodRouter<AppState> {
        method.layer(from_fn_with_state(
            PermissionGate::new(auth.clone(), RESOURCE_ROLE, action),
            require_permission,
        ))
    };

    Router::new()
        // OAuth / OIDC
        .route("/oauth/authorize", get(authorize_handler))
        .route("/oauth/token", post(token_handler))
        .route("/oauth/revoke", post(revoke_handler))
        .route("/oauth/introspect", post(introspect_handler))
        .route(
            "/oauth/userinfo",
            get(userinfo_handler).post(userinfo_handler),
        )
        .route("/.well-known/openid-configuration", get(discovery_handler))
        .route("/.well-known/jwks.json", get(jwks_handler))
        // CAS
        .route("/cas/tickets", post(create_ticket_handler))
        .route("/cas/tickets/{tgt}", delete(logout_handler))
        .route("/cas/serviceValidate", get(service_validate_handler))
        // First-party auth
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/refresh", post(auth::refresh_handler))
        .route("/api/v1/auth/logout", post(auth::logout_handler))
        .route("/api/v1/auth/me", get(auth::me_handler))
        .route("/api/v1/auth/password", post(change_password_handler))
        .route("/api/v1/me/permissions", get(users::my_permissions_handler))
        // RBAC administration
        .route(
            "/api/v1/roles",
            guarded(get(roles::list_roles_handler), ACTION_READ)
                .merge(guarded(post(roles::create_role_handler), ACTION_WRITE)),
        )
        .route(
            "/api/v1/roles/{id}",
            guarded(get(roles::get_role_handler), ACTION_READ)
                .merge(guarded(put(roles::update_role_handler), ACTION_WRITE))
                .merge(guarded(delete(roles::delete_role_handler), ACTION_DELETE)),
        )
        .route(
            "/api/v1/roles/{id}/permissions",
            guarded(get(roles::role_permissions_handler), ACTION_READ)
                .merge(guarded(post(roles::add_role_permissions_handler), ACTION_WRITE))
                .merge(guarded(delete(roles::remove_role_permissions_handler), ACTION_WRITE)),
        )
        .route(
            "/api/v1/permissions",
            guarded(get(roles::list_permissions_handler), ACTION_READ)
                .merge(guarded(post(roles::create_permission_handler), ACTION_WRITE)),
        )
        .route(
            "/api/v1/permissions/{id}",
            guarded(get(roles::get_permission_handler), ACTION_READ)
                .merge(guarded(delete(roles::delete_permission_handler), ACTION_DELETE)),
        )
        .route(
            "/api/v1/users/{id}/roles",
            get(users::user_roles_handler).post(users::assign_role_handler),
        )
        .route(
            "/api/v1/users/{id}/roles/{role_id}",
            delete(users::revoke_role_handler),
        )
        .route(
            "/api/v1/users/{id}/permissions",
            get(users::user_permissions_handler),
        )
        .route("/api/v1/users/{id}/unlock", post(users::unlock_handler))
        .route(
            "/api/v1/users/{id}/password",
            post(users::reset_password_handler),
        )
        .route("/healthz", get(health_handler))
        .with_state(state)
}

/// `GET /healthz`
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
