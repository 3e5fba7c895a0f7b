//! Authorization endpoint types.
//!
//! The handler produces an [`AuthorizeOutcome`]; the HTTP layer turns it
//! into a 302 or an error body.
//!
//! # Flow
//!
//! 1. Client redirects the user to `/oauth/authorize` with request parameters
//! 2. Unauthenticated users are sent to the login page and come back
//! 3. Server redirects back to the client with a code (or a fragment token
//!    for the implicit flow)
//! 4. Client exchanges the code at the token endpoint

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Authorization request query parameters.
///
/// Every field is optional at the wire level so missing parameters can be
/// reported as `invalid_request` rather than a deserialization failure.
///
/// # Example
///
/// ```ignore
/// GET /oauth/authorize?
///   response_type=code
///   &client_id=my-app
///   &redirect_uri=https://app.example.com/callback
///   &scope=openid profile
///   &state=abc123xyz
///   &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM
///   &code_challenge_method=S256
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// What the authorization endpoint should do.
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// 302 to the client: a code, an implicit token, or an error redirect.
    Redirect(String),

    /// 302 to the login page.
    LoginRequired(String),

    /// Render the error directly; the redirect URI cannot be trusted.
    Reject(AuthError),
}

impl AuthorizeOutcome {
    /// Location header value for redirect outcomes.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect(location) | Self::LoginRequired(location) => Some(location),
            Self::Reject(_) => None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// `redirect_uri?code=..&state=..`
///
/// # Errors
///
/// Returns an error if `redirect_uri` is not an absolute URL.
pub fn code_redirect(
    redirect_uri: &str,
    code: &str,
    state: Option<&str>,
) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(redirect_uri)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", code);
        if let Some(state) = non_empty(state) {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.to_string())
}

/// `redirect_uri?error=..&error_description=..&state=..`
///
/// # Errors
///
/// Returns an error if `redirect_uri` is not an absolute URL.
pub fn error_redirect(
    redirect_uri: &str,
    error: &str,
    description: &str,
    state: Option<&str>,
) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(redirect_uri)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", error);
        pairs.append_pair("error_description", description);
        if let Some(state) = non_empty(state) {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.to_string())
}

/// Implicit-flow response carried in the URL fragment:
/// `redirect_uri#access_token=..&token_type=Bearer&expires_in=..&scope=..&state=..`
///
/// # Errors
///
/// Returns an error if `redirect_uri` is not an absolute URL.
pub fn implicit_redirect(
    redirect_uri: &str,
    access_token: &str,
    expires_in: u64,
    scope: &str,
    state: Option<&str>,
) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(redirect_uri)?;
    let mut fragment = url::form_urlencoded::Serializer::new(String::new());
    fragment
        .append_pair("access_token", access_token)
        .append_pair("token_type", "Bearer")
        .append_pair("expires_in", &expires_in.to_string());
    if !scope.is_empty() {
        fragment.append_pair("scope", scope);
    }
    if let Some(state) = non_empty(state) {
        fragment.append_pair("state", state);
    }
    url.set_fragment(Some(&fragment.finish()));
    Ok(url.to_string())
}

/// `<login_url>?redirect=<url-encoded original request URI>`
#[must_use]
pub fn login_redirect(login_url: &str, original_uri: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(original_uri.as_bytes()).collect();
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}redirect={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALLBACK: &str = "https://app.example.com/callback";

    #[test]
    fn test_request_deserializes_with_missing_fields() {
        let request: AuthorizeRequest =
            serde_json::from_str(r#"{"client_id": "my-app"}"#).unwrap();
        assert_eq!(request.client_id.as_deref(), Some("my-app"));
        assert!(request.response_type.is_none());
    }

    #[test]
    fn test_code_redirect() {
        let location = code_redirect(CALLBACK, "abc", Some("xyz")).unwrap();
        assert_eq!(location, "https://app.example.com/callback?code=abc&state=xyz");

        let location = code_redirect(CALLBACK, "abc", Some("")).unwrap();
        assert_eq!(location, "https://app.example.com/callback?code=abc");
    }

    #[test]
    fn test_error_redirect_keeps_existing_query() {
        let location = error_redirect(
            "https://app.example.com/callback?tenant=1",
            "invalid_scope",
            "scope not allowed",
            Some("s1"),
        )
        .unwrap();
        let url = url::Url::parse(&location).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tenant".into(), "1".into()),
                ("error".into(), "invalid_scope".into()),
                ("error_description".into(), "scope not allowed".into()),
                ("state".into(), "s1".into()),
            ]
        );
    }

    #[test]
    fn test_implicit_redirect_uses_fragment() {
        let location = implicit_redirect(CALLBACK, "tok", 900, "openid", Some("s")).unwrap();
        let url = url::Url::parse(&location).unwrap();
        assert!(url.query().is_none());
        assert_eq!(
            url.fragment(),
            Some("access_token=tok&token_type=Bearer&expires_in=900&scope=openid&state=s")
        );
    }

    #[test]
    fn test_login_redirect_encodes_original() {
        let location = login_redirect("/login", "/oauth/authorize?client_id=a&scope=openid profile");
        assert_eq!(
            location,
            "/login?redirect=%2Foauth%2Fauthorize%3Fclient_id%3Da%26scope%3Dopenid+profile"
        );
    }
}
