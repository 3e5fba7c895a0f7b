//! OAuth 2.x / OpenID Connect endpoints.
//!
//! Thin adapters over [`ProtocolHandler`](crate::oauth::ProtocolHandler):
//! they pull parameters out of the request, pick the signed-in subject and
//! turn outcomes into redirects or JSON.

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, OriginalUri, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::error::AuthError;
use crate::middleware::{BearerAuth, OptionalBearerAuth};
use crate::oauth::{
    AuthorizeOutcome, AuthorizeRequest, IntrospectRequest, RevokeRequest, TokenRequest,
    parse_basic_auth,
};

use super::AppState;

/// `GET /oauth/authorize`
///
/// The subject is the bearer's user when a valid access token is sent,
/// otherwise the user of the session named by the session cookie.
pub async fn authorize_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    OptionalBearerAuth(auth): OptionalBearerAuth,
    jar: CookieJar,
    Query(request): Query<AuthorizeRequest>,
) -> Response {
    let mut subject = auth
        .filter(|a| a.is_user_authenticated())
        .map(|a| a.user_id);

    if subject.is_none()
        && let Some(cookie) = jar.get(&state.cookie_name)
    {
        match state.cas.get_session(cookie.value()).await {
            Ok(session) => subject = Some(session.user_id),
            Err(e) => tracing::debug!(error = %e, "Session cookie ignored"),
        }
    }

    let outcome = state
        .oauth
        .authorize(&request, subject.as_deref(), &uri.to_string())
        .await;

    match outcome {
        AuthorizeOutcome::Redirect(location) | AuthorizeOutcome::LoginRequired(location) => {
            found(location)
        }
        AuthorizeOutcome::Reject(error) => {
            tracing::debug!(
                client_id = request.client_id.as_deref().unwrap_or_default(),
                error = %error,
                "Authorization request rejected"
            );
            error.into_response()
        }
    }
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// `POST /oauth/token`
///
/// Client credentials may come from the form or from HTTP Basic; the form
/// wins when both are present.
pub async fn token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return AuthError::invalid_request(rejection.body_text()).into_response();
        }
    };

    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic_auth);
    let request = request.with_basic_credentials(basic);
    let grant_type = request.grant_type.clone();

    match state.oauth.token(request).await {
        Ok(response) => {
            tracing::info!(grant_type = %grant_type, "Token issued");
            (
                [
                    (header::CACHE_CONTROL, "no-store"),
                    (header::PRAGMA, "no-cache"),
                ],
                Json(response),
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!(grant_type = %grant_type, error = %error, "Token request failed");
            error.into_response()
        }
    }
}

/// `POST /oauth/revoke`
pub async fn revoke_handler(
    State(state): State<AppState>,
    form: Result<Form<RevokeRequest>, FormRejection>,
) -> Response {
    let request = form.map(|Form(r)| r).unwrap_or_default();
    match state.oauth.revoke(request).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error.into_response(),
    }
}

/// `POST /oauth/introspect`
pub async fn introspect_handler(
    State(state): State<AppState>,
    form: Result<Form<IntrospectRequest>, FormRejection>,
) -> Response {
    let request = form.map(|Form(r)| r).unwrap_or_default();
    Json(state.oauth.introspect(request).await).into_response()
}

/// `GET|POST /oauth/userinfo`
pub async fn userinfo_handler(
    State(state): State<AppState>,
    BearerAuth(auth): BearerAuth,
) -> Response {
    match state.oauth.userinfo(&auth.claims).await {
        Ok(info) => Json(info).into_response(),
        Err(error) => error.into_response(),
    }
}

/// `GET /.well-known/openid-configuration`
pub async fn discovery_handler(State(state): State<AppState>) -> Response {
    Json(state.oauth.discovery()).into_response()
}

/// `GET /.well-known/jwks.json`
pub async fn jwks_handler(State(state): State<AppState>) -> Response {
    (
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(state.oauth.jwks()),
    )
        .into_response()
}
