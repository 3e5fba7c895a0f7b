//! `IntoResponse` for [`AuthError`].
//!
//! Errors render as an OAuth-style JSON body
//! `{"error": "...", "error_description": "..."}`. 401 responses also carry a
//! `WWW-Authenticate: Bearer` challenge.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AuthError;

/// Realm advertised in bearer challenges.
pub const REALM: &str = "uac";

/// OAuth error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. }
            | Self::InvalidGrant { .. }
            | Self::InvalidScope { .. }
            | Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::PkceVerificationFailed
            | Self::InvalidTicket { .. }
            | Self::InvalidService { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidClient { .. }
            | Self::InvalidToken { .. }
            | Self::Unauthorized { .. }
            | Self::TokenExpired
            | Self::TokenRevoked
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. }
            | Self::AccessDenied { .. }
            | Self::AccountLocked
            | Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human-readable `error_description`.
    ///
    /// Server errors are not described to the caller.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidScope { message }
            | Self::InvalidToken { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::InvalidRequest { message }
            | Self::AccessDenied { message }
            | Self::InvalidTicket { message }
            | Self::InvalidService { message }
            | Self::NotFound { message }
            | Self::Conflict { message } => message.clone(),
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.oauth_error_code();
        let description = self.description();

        if self.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        }

        let mut response = (
            status,
            Json(ErrorBody {
                error,
                error_description: description.clone(),
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            let challenge = www_authenticate(error, &description);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

/// `Bearer realm="uac", error="...", error_description="..."`
fn www_authenticate(error: &str, description: &str) -> String {
    let escaped = description.replace('"', "\\\"");
    format!("Bearer realm=\"{REALM}\", error=\"{error}\", error_description=\"{escaped}\"")
}
