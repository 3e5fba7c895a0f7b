//! Token, revocation and introspection wire types.
//!
//! Requests arrive as `application/x-www-form-urlencoded` bodies; responses
//! are JSON.

use serde::{Deserialize, Serialize};

use crate::token::TokenClaims;

/// Grant type values accepted on the token endpoint.
pub mod grant_type {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const PASSWORD: &str = "password";
}

/// Token endpoint form body.
///
/// Client credentials may also arrive in the `Authorization: Basic` header;
/// the HTTP layer merges them into `client_id`/`client_secret` before the
/// request reaches the handler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenRequest {
    /// Fills `client_id` and `client_secret` from Basic credentials when
    /// the body does not carry them.
    #[must_use]
    pub fn with_basic_credentials(mut self, credentials: Option<(String, String)>) -> Self {
        if let Some((id, secret)) = credentials {
            if self.client_id.as_deref().is_none_or(str::is_empty) {
                self.client_id = Some(id);
            }
            if self.client_secret.as_deref().is_none_or(str::is_empty) {
                self.client_secret = Some(secret);
            }
        }
        self
    }
}

/// Successful token response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Present when `openid` was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scopes, space-separated.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

impl TokenResponse {
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: None,
            id_token: None,
            scope,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, token: String) -> Self {
        self.id_token = Some(token);
        self
    }
}

/// Revocation request (RFC 7009).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevokeRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// Introspection request (RFC 7662).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrospectRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// Introspection response. Only `active` is present for inactive tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            active: true,
            scope: Some(claims.scope_string()),
            client_id: claims.client_id.clone(),
            username: claims.username.clone(),
            token_type: Some(claims.kind.as_str().to_string()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            sub: claims.user_id().map(str::to_string),
            iss: Some(claims.iss.clone()),
            jti: Some(claims.jti.clone()),
        }
    }
}

/// Parses `Authorization: Basic base64(client_id:client_secret)`.
///
/// Splits on the first colon, so secrets may contain colons.
///
/// # Example
///
/// ```
/// use uac_auth::oauth::token::parse_basic_auth;
///
/// let parsed = parse_basic_auth("Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=");
/// assert_eq!(parsed, Some(("client_id".to_string(), "client_secret".to_string())));
/// ```
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = credentials.split_once(':')?;

    Some((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::new("access".into(), 900, "openid profile".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 900);
        assert_eq!(json["scope"], "openid profile");
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("id_token").is_none());

        let response = response
            .with_refresh_token("refresh".into())
            .with_id_token("id".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["refresh_token"], "refresh");
        assert_eq!(json["id_token"], "id");
    }

    #[test]
    fn test_inactive_introspection_is_bare() {
        let json = serde_json::to_string(&IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, r#"{"active":false}"#);
    }

    #[test]
    fn test_introspection_from_client_claims_has_no_sub() {
        let claims = TokenClaims {
            kind: TokenKind::Access,
            iss: "https://auth.example.com".into(),
            jti: "j1".into(),
            iat: 10,
            exp: 20,
            ..TokenClaims::for_client("client-1").with_scopes(vec!["read".into()])
        };
        let response = IntrospectionResponse::from_claims(&claims);
        assert!(response.active);
        assert!(response.sub.is_none());
        assert_eq!(response.client_id.as_deref(), Some("client-1"));
        assert_eq!(response.token_type.as_deref(), Some("access"));
        assert_eq!(response.scope.as_deref(), Some("read"));
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth("Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ="),
            Some(("client_id".into(), "client_secret".into()))
        );
        // "client:pass:word"
        assert_eq!(
            parse_basic_auth("Basic Y2xpZW50OnBhc3M6d29yZA=="),
            Some(("client".into(), "pass:word".into()))
        );
        assert!(parse_basic_auth("Bearer abc").is_none());
        assert!(parse_basic_auth("Basic !!!").is_none());
        // "nocolon"
        assert!(parse_basic_auth("Basic bm9jb2xvbg==").is_none());
    }

    #[test]
    fn test_basic_credentials_do_not_override_body() {
        let request = TokenRequest {
            client_id: Some("from-body".into()),
            ..TokenRequest::default()
        }
        .with_basic_credentials(Some(("from-header".into(), "secret".into())));
        assert_eq!(request.client_id.as_deref(), Some("from-body"));
        assert_eq!(request.client_secret.as_deref(), Some("secret"));
    }
}
