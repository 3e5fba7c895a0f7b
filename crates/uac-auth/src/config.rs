//! Authentication configuration.
//!
//! Token lifetimes, CAS ticket lifetimes, password lockout policy and signing
//! key settings. Every section deserializes with defaults, so an empty
//! `[auth]` table yields a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root authentication configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.oauth]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "7d"
///
/// [auth.lockout]
/// max_failed_attempts = 5
/// lock_duration = "15m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL placed in the `iss` claim and the discovery document.
    pub issuer: String,

    /// OAuth 2.0 / OIDC settings.
    pub oauth: OAuthConfig,

    /// CAS session and ticket settings.
    pub cas: CasConfig,

    /// Password lockout policy.
    pub lockout: LockoutConfig,

    /// Token signing key settings.
    pub signing: SigningConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
            cas: CasConfig::default(),
            lockout: LockoutConfig::default(),
            signing: SigningConfig::default(),
        }
    }
}

/// OAuth 2.0 configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime. Identity tokens share it.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Permit `response_type=token` for OAuth 2.0 applications.
    /// OAuth 2.1 applications never get the implicit flow.
    pub allow_implicit_flow: bool,

    /// Login page unauthenticated authorize requests are sent to.
    pub login_url: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(900),       // 15 minutes
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            allow_implicit_flow: false,
            login_url: "/login".to_string(),
        }
    }
}

/// CAS session and ticket lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CasConfig {
    /// Default session lifetime.
    #[serde(with = "humantime_serde")]
    pub session_lifetime: Duration,

    /// Ticket-granting ticket lifetime.
    #[serde(with = "humantime_serde")]
    pub tgt_lifetime: Duration,

    /// Service ticket lifetime.
    #[serde(with = "humantime_serde")]
    pub st_lifetime: Duration,

    /// Browser cookie carrying the session id.
    pub cookie_name: String,

    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            session_lifetime: Duration::from_secs(7 * 24 * 3600),
            tgt_lifetime: Duration::from_secs(8 * 3600),
            st_lifetime: Duration::from_secs(300),
            cookie_name: "uac_session".to_string(),
            secure_cookie: false,
        }
    }
}

/// Password lockout policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failures that lock the account.
    pub max_failed_attempts: u32,

    /// How long a locked account stays locked.
    #[serde(with = "humantime_serde")]
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lock_duration: Duration::from_secs(15 * 60),
        }
    }
}

/// Signing key settings.
///
/// Without a key path a fresh RSA-2048 key is generated at startup, which
/// invalidates previously issued tokens on restart.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// PKCS#8 or PKCS#1 PEM file holding the RSA private key.
    pub private_key_path: Option<PathBuf>,

    /// Key id placed in the JWT header and the JWKS. Derived from the
    /// public key when unset.
    pub kid: Option<String>,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the issuer is empty, and
    /// `ConfigError::InvalidValue` for zero lifetimes, a zero lockout
    /// threshold, or a refresh lifetime shorter than the access lifetime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("auth.issuer".to_string()));
        }

        let lifetimes = [
            (
                "oauth.authorization_code_lifetime",
                self.oauth.authorization_code_lifetime,
            ),
            (
                "oauth.access_token_lifetime",
                self.oauth.access_token_lifetime,
            ),
            (
                "oauth.refresh_token_lifetime",
                self.oauth.refresh_token_lifetime,
            ),
            ("cas.session_lifetime", self.cas.session_lifetime),
            ("cas.tgt_lifetime", self.cas.tgt_lifetime),
            ("cas.st_lifetime", self.cas.st_lifetime),
            ("lockout.lock_duration", self.lockout.lock_duration),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.oauth.refresh_token_lifetime < self.oauth.access_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must not be shorter than access_token_lifetime"
                    .to_string(),
            ));
        }

        if self.oauth.login_url.trim().is_empty() {
            return Err(ConfigError::Missing("oauth.login_url".to_string()));
        }

        if self.cas.cookie_name.trim().is_empty() {
            return Err(ConfigError::Missing("cas.cookie_name".to_string()));
        }

        if self.lockout.max_failed_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "max_failed_attempts must be > 0".to_string(),
            ));
        }

        if self.signing.kid.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "signing.kid must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.issuer, "http://localhost:8080");
        assert!(!config.oauth.allow_implicit_flow);
        assert!(config.signing.private_key_path.is_none());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_issuer_fails_validation() {
        let mut config = AuthConfig::default();
        config.issuer = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_zero_lifetime_fails_validation() {
        let mut config = AuthConfig::default();
        config.cas.st_lifetime = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("cas.st_lifetime"));
    }

    #[test]
    fn test_refresh_shorter_than_access_fails_validation() {
        let mut config = AuthConfig::default();
        config.oauth.refresh_token_lifetime = Duration::from_secs(60);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_token_lifetime"));
    }

    #[test]
    fn test_zero_failed_attempts_fails_validation() {
        let mut config = AuthConfig::default();
        config.lockout.max_failed_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_failed_attempts"));
    }

    #[test]
    fn test_oauth_default_lifetimes() {
        let oauth = OAuthConfig::default();
        assert_eq!(oauth.authorization_code_lifetime, Duration::from_secs(600));
        assert_eq!(oauth.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(
            oauth.refresh_token_lifetime,
            Duration::from_secs(7 * 24 * 3600)
        );
    }

    #[test]
    fn test_cas_and_lockout_defaults() {
        let cas = CasConfig::default();
        assert_eq!(cas.tgt_lifetime, Duration::from_secs(8 * 3600));
        assert_eq!(cas.st_lifetime, Duration::from_secs(300));

        let lockout = LockoutConfig::default();
        assert_eq!(lockout.max_failed_attempts, 5);
        assert_eq!(lockout.lock_duration, Duration::from_secs(900));
    }

    #[test]
    fn test_humantime_durations_parse() {
        let json = r#"{"oauth": {"access_token_lifetime": "5m", "allow_implicit_flow": true}}"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.oauth.access_token_lifetime, Duration::from_secs(300));
        assert!(config.oauth.allow_implicit_flow);
        assert_eq!(config.cas.st_lifetime, Duration::from_secs(300));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");

        let err = ConfigError::Missing("required_field".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required configuration: required_field"
        );
    }
}
