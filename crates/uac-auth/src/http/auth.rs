//! First-party password login.
//!
//! A successful login opens a CAS session with its TGT, sets the session
//! cookie that `/oauth/authorize` recognizes and returns a token pair.
//! Logout revokes the bearer token and ends that session.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{Account, AccountStatus};
use crate::cas::{CasError, NewSession};
use crate::error::AuthError;
use crate::middleware::{BearerAuth, bearer_token};
use crate::oauth::TokenRequest;
use crate::oauth::token::grant_type;
use crate::token::TokenClaims;

use super::AppState;

/// Scopes granted to first-party logins.
pub const LOGIN_SCOPES: &[&str] = &["openid", "profile", "email"];

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    /// Ticket-granting ticket for minting CAS service tickets.
    pub tgt: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Profile of the authenticated user.
#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub status: AccountStatus,
}

impl From<Account> for CurrentUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            display_name: account.display_name,
            phone: account.phone,
            status: account.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// `POST /api/v1/auth/login`
///
/// Email wins over username when both are sent.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return AuthError::invalid_request(rejection.body_text()).into_response(),
    };

    match login(&state, &headers, request).await {
        Ok((response, cookie)) => (jar.add(cookie), Json(response)).into_response(),
        Err(error) => error.into_response(),
    }
}

async fn login(
    state: &AppState,
    headers: &HeaderMap,
    request: LoginRequest,
) -> Result<(LoginResponse, Cookie<'static>), AuthError> {
    let email = request.email.filter(|e| !e.is_empty());
    let username = request.username.filter(|u| !u.is_empty());

    let account = match (email, username) {
        (Some(email), _) => {
            state
                .passwords
                .authenticate_by_email(&email, &request.password)
                .await
        }
        (None, Some(username)) => {
            state
                .passwords
                .authenticate(&username, &request.password)
                .await
        }
        (None, None) => return Err(AuthError::invalid_request("username or email is required")),
    }
    .inspect_err(|e| tracing::info!(error = %e, "Login failed"))?;

    let session_id = Uuid::new_v4().to_string();
    let tgt = state.cas.create_tgt(&account.id, &session_id).await?;
    let session = state
        .cas
        .create_session(
            NewSession::for_user(account.id.clone())
                .with_id(session_id)
                .with_tgt(tgt.id.clone())
                .with_client_info(client_ip(headers), user_agent(headers)),
        )
        .await?;

    let claims = login_claims(&account);
    let access_token = state.tokens.issue_access(claims.clone())?;
    let refresh_token = state.tokens.issue_refresh(claims)?;

    tracing::info!(user_id = %account.id, session_id = %session.id, "User logged in");

    let max_age = (session.expires_at - session.created_at).whole_seconds();
    let cookie = Cookie::build((state.cookie_name.clone(), session.id.clone()))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookie)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build();

    Ok((
        LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: state.tokens.access_token_lifetime().as_secs(),
            tgt: tgt.id,
            session_id: session.id,
        },
        cookie,
    ))
}

fn login_claims(account: &Account) -> TokenClaims {
    let mut claims = TokenClaims::for_user(account.id.clone())
        .with_username(account.username.clone())
        .with_scopes(LOGIN_SCOPES.iter().map(ToString::to_string).collect());
    if let Some(email) = &account.email {
        claims = claims.with_email(email.clone());
    }
    claims
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .unwrap_or_default()
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `POST /api/v1/auth/refresh`
///
/// Rotates a first-party refresh token. The presented token stops working.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return AuthError::invalid_request(rejection.body_text()).into_response(),
    };

    let request = TokenRequest {
        grant_type: grant_type::REFRESH_TOKEN.to_string(),
        refresh_token: Some(request.refresh_token),
        ..TokenRequest::default()
    };
    match state.oauth.token(request).await {
        Ok(response) => (
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

/// `POST /api/v1/auth/logout`
///
/// Revokes the presented access token. When the session cookie names a
/// session of the same user, the session and its TGT are deleted and the
/// cookie is cleared.
pub async fn logout_handler(
    State(state): State<AppState>,
    BearerAuth(auth): BearerAuth,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Some(token) = bearer_token(&headers)
        && let Err(e) = state.tokens.revoke(token).await
    {
        return AuthError::from(e).into_response();
    }

    let Some(session_id) = jar.get(&state.cookie_name).map(|c| c.value().to_string()) else {
        tracing::info!(user_id = %auth.user_id, "User logged out");
        return StatusCode::NO_CONTENT.into_response();
    };

    if let Err(e) = end_session(&state, &auth.user_id, &session_id).await {
        return AuthError::from(e).into_response();
    }

    tracing::info!(user_id = %auth.user_id, session_id = %session_id, "User logged out");
    let jar = jar.remove(Cookie::build(state.cookie_name.clone()).path("/"));
    (jar, StatusCode::NO_CONTENT).into_response()
}

async fn end_session(state: &AppState, user_id: &str, session_id: &str) -> Result<(), CasError> {
    let session = match state.cas.get_session(session_id).await {
        Ok(session) => session,
        Err(CasError::SessionNotFound | CasError::SessionExpired) => return Ok(()),
        Err(e) => return Err(e),
    };
    if session.user_id != user_id {
        tracing::warn!(user_id = %user_id, session_id = %session_id, "Session cookie belongs to another user");
        return Ok(());
    }

    if let Some(tgt_id) = &session.tgt_id {
        state.cas.delete_tgt(tgt_id).await?;
    }
    state.cas.delete_session(session_id).await
}

/// `GET /api/v1/auth/me`
pub async fn me_handler(State(state): State<AppState>, BearerAuth(auth): BearerAuth) -> Response {
    if !auth.is_user_authenticated() {
        return AuthError::forbidden("Client tokens have no user profile").into_response();
    }

    match state.accounts.find_by_id(&auth.user_id).await {
        Ok(Some(account)) => Json(CurrentUser::from(account)).into_response(),
        Ok(None) => AuthError::not_found("User not found").into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `POST /api/v1/auth/password`
pub async fn change_password_handler(
    State(state): State<AppState>,
    BearerAuth(auth): BearerAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Response {
    if !auth.is_user_authenticated() {
        return AuthError::forbidden("Password change requires a user token").into_response();
    }

    match state
        .passwords
        .change_password(&auth.user_id, &request.old_password, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}
