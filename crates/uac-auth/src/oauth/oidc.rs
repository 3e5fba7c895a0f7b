//! OpenID Connect discovery and userinfo documents.

use serde::{Deserialize, Serialize};

use crate::account::Account;

/// Scopes advertised in discovery.
pub const SUPPORTED_SCOPES: &[&str] = &["openid", "profile", "email", "phone", "offline_access"];

/// Claims advertised in discovery.
pub const SUPPORTED_CLAIMS: &[&str] = &[
    "sub",
    "iss",
    "aud",
    "exp",
    "iat",
    "nonce",
    "name",
    "preferred_username",
    "picture",
    "email",
    "email_verified",
    "phone_number",
    "phone_number_verified",
];

/// `/.well-known/openid-configuration` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

impl DiscoveryDocument {
    /// Builds the document with every endpoint under `issuer`.
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        let base = issuer.trim_end_matches('/');
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{base}/oauth/authorize"),
            token_endpoint: format!("{base}/oauth/token"),
            userinfo_endpoint: format!("{base}/oauth/userinfo"),
            jwks_uri: format!("{base}/.well-known/jwks.json"),
            revocation_endpoint: format!("{base}/oauth/revoke"),
            introspection_endpoint: format!("{base}/oauth/introspect"),
            response_types_supported: strings(&["code"]),
            grant_types_supported: strings(&[
                "authorization_code",
                "refresh_token",
                "client_credentials",
            ]),
            subject_types_supported: strings(&["public"]),
            id_token_signing_alg_values_supported: strings(&["RS256"]),
            scopes_supported: strings(SUPPORTED_SCOPES),
            token_endpoint_auth_methods_supported: strings(&[
                "client_secret_basic",
                "client_secret_post",
            ]),
            claims_supported: strings(SUPPORTED_CLAIMS),
            code_challenge_methods_supported: strings(&["plain", "S256"]),
        }
    }
}

/// Userinfo response. Fields beyond `sub` depend on the granted scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_verified: Option<bool>,
}

impl UserInfo {
    /// Projects an account through the granted scopes.
    #[must_use]
    pub fn from_account<S: AsRef<str>>(account: &Account, scopes: &[S]) -> Self {
        let granted = |scope: &str| scopes.iter().any(|s| s.as_ref() == scope);
        let mut info = Self {
            sub: account.id.clone(),
            ..Self::default()
        };

        if granted("profile") {
            info.name = Some(
                account
                    .display_name
                    .clone()
                    .unwrap_or_else(|| account.username.clone()),
            );
            info.preferred_username = Some(account.username.clone());
            info.picture = account.avatar_url.clone();
        }

        if granted("email") {
            if let Some(email) = &account.email {
                info.email = Some(email.clone());
                info.email_verified = Some(account.email_verified);
            }
        }

        if granted("phone") {
            if let Some(phone) = &account.phone {
                info.phone_number = Some(phone.clone());
                info.phone_number_verified = Some(account.phone_verified);
            }
        }

        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_endpoints() {
        let doc = DiscoveryDocument::for_issuer("https://auth.example.com/");
        assert_eq!(doc.issuer, "https://auth.example.com/");
        assert_eq!(doc.token_endpoint, "https://auth.example.com/oauth/token");
        assert_eq!(doc.jwks_uri, "https://auth.example.com/.well-known/jwks.json");
        assert_eq!(doc.response_types_supported, vec!["code"]);
        assert_eq!(doc.code_challenge_methods_supported, vec!["plain", "S256"]);
        assert!(doc.scopes_supported.contains(&"offline_access".to_string()));
    }

    #[test]
    fn test_userinfo_scope_gating() {
        let account = Account::new("alice")
            .with_id("u1")
            .with_email("alice@example.com")
            .with_phone("+100")
            .with_display_name("Alice");

        let info = UserInfo::from_account(&account, &["openid"]);
        assert_eq!(info, UserInfo { sub: "u1".into(), ..UserInfo::default() });

        let info = UserInfo::from_account(&account, &["openid", "profile", "email"]);
        assert_eq!(info.name.as_deref(), Some("Alice"));
        assert_eq!(info.preferred_username.as_deref(), Some("alice"));
        assert_eq!(info.email.as_deref(), Some("alice@example.com"));
        assert_eq!(info.email_verified, Some(false));
        assert!(info.phone_number.is_none());

        let info = UserInfo::from_account(&account, &["phone"]);
        assert_eq!(info.phone_number.as_deref(), Some("+100"));
    }

    #[test]
    fn test_userinfo_omits_missing_phone() {
        let account = Account::new("bob").with_id("u2");
        let info = UserInfo::from_account(&account, &["phone", "email"]);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json, serde_json::json!({"sub": "u2"}));
    }
}
