//! Token service: issuance, validation, authorization codes and revocation.
//!
//! Signing and verification are synchronous and never run inside a store
//! call. All mutable state (authorization codes, revocation records) lives
//! in the shared [`KeyValueStore`].
//!
//! # Usage
//!
//! ```ignore
//! use uac_auth::token::{JwtTokenService, TokenClaims, TokenService};
//! use uac_auth::token::service::TokenConfig;
//!
//! let service = JwtTokenService::new(jwt, store, TokenConfig::new("https://auth.example.com"));
//! let access = service.issue_access(TokenClaims::for_user("u1"))?;
//! let claims = service.validate(&access).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::store::{KeyValueStore, clamp_ttl};
use crate::token::claims::{TokenClaims, TokenKind};
use crate::token::code::AuthorizationCode;
use crate::token::jwt::{Jwks, JwtService};
use crate::token::{TokenError, TokenResult};

/// Key prefix for revocation records.
pub const REVOKED_PREFIX: &str = "revoked:";

/// Issues, validates and revokes bearer tokens and authorization codes.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Signs an access token.
    fn issue_access(&self, claims: TokenClaims) -> TokenResult<String>;

    /// Signs a refresh token.
    fn issue_refresh(&self, claims: TokenClaims) -> TokenResult<String>;

    /// Signs an OIDC identity token; `aud` is the app id, or the client id.
    fn issue_identity(&self, claims: TokenClaims) -> TokenResult<String>;

    /// Checks revocation, signature, expiry and issuer, in that order.
    async fn validate(&self, token: &str) -> TokenResult<TokenClaims>;

    /// Stores a new authorization code record and returns the code.
    async fn issue_authorization_code(&self, record: AuthorizationCode) -> TokenResult<String>;

    /// Redeems a code exactly once.
    async fn redeem_authorization_code(&self, code: &str) -> TokenResult<AuthorizationCode>;

    /// Adds the token to the revocation set. Idempotent and accepts any string.
    async fn revoke(&self, token: &str) -> TokenResult<()>;

    /// Returns `true` if the token is in the revocation set.
    async fn is_revoked(&self, token: &str) -> TokenResult<bool>;

    /// Revokes a token only if it is not revoked yet.
    ///
    /// Returns `true` for exactly one of several concurrent callers; that
    /// caller owns the rotation of the token.
    async fn consume_refresh(&self, token: &str) -> TokenResult<bool>;

    /// The active public key set.
    fn jwks(&self) -> Jwks;

    /// The active key id.
    fn current_kid(&self) -> String;

    /// The issuer placed in `iss`.
    fn issuer(&self) -> &str;

    /// Access token lifetime, reported as `expires_in`.
    fn access_token_lifetime(&self) -> Duration;
}

/// Lifetimes used by [`JwtTokenService`].
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub authorization_code_lifetime: Duration,
}

impl TokenConfig {
    /// Default lifetimes: 15 minutes access, 7 days refresh, 10 minutes code.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600),
            authorization_code_lifetime: Duration::from_secs(10 * 60),
        }
    }

    /// Takes issuer and lifetimes from the auth configuration.
    #[must_use]
    pub fn from_auth_config(config: &AuthConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            access_token_lifetime: config.oauth.access_token_lifetime,
            refresh_token_lifetime: config.oauth.refresh_token_lifetime,
            authorization_code_lifetime: config.oauth.authorization_code_lifetime,
        }
    }
}

/// [`TokenService`] over an RS256 signer and a shared store.
pub struct JwtTokenService {
    jwt: JwtService,
    store: Arc<dyn KeyValueStore>,
    config: TokenConfig,
}

impl JwtTokenService {
    #[must_use]
    pub fn new(jwt: JwtService, store: Arc<dyn KeyValueStore>, config: TokenConfig) -> Self {
        Self { jwt, store, config }
    }

    fn sign(&self, mut claims: TokenClaims, kind: TokenKind, lifetime: Duration) -> TokenResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        claims.kind = kind;
        claims.iss = self.config.issuer.clone();
        claims.jti = Uuid::new_v4().to_string();
        claims.iat = now;
        claims.exp = now + duration_secs(lifetime);
        if claims.uid.is_empty() {
            claims.uid = claims.sub.clone();
        }
        Ok(self.jwt.encode(&claims)?)
    }

    /// Remaining lifetime of a token from its unverified `exp` claim, falling
    /// back to the refresh lifetime when it cannot be read.
    fn revocation_ttl(&self, token: &str) -> Duration {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        match unverified_exp(token) {
            Some(exp) if exp > now => clamp_ttl(Duration::from_secs((exp - now).unsigned_abs())),
            Some(_) => clamp_ttl(Duration::ZERO),
            None => self.config.refresh_token_lifetime,
        }
    }
}

#[async_trait]
impl TokenService for JwtTokenService {
    fn issue_access(&self, claims: TokenClaims) -> TokenResult<String> {
        self.sign(claims, TokenKind::Access, self.config.access_token_lifetime)
    }

    fn issue_refresh(&self, claims: TokenClaims) -> TokenResult<String> {
        self.sign(claims, TokenKind::Refresh, self.config.refresh_token_lifetime)
    }

    fn issue_identity(&self, mut claims: TokenClaims) -> TokenResult<String> {
        claims.aud = claims.app_id.clone().or_else(|| claims.client_id.clone());
        self.sign(claims, TokenKind::Id, self.config.access_token_lifetime)
    }

    async fn validate(&self, token: &str) -> TokenResult<TokenClaims> {
        if self.is_revoked(token).await? {
            return Err(TokenError::Revoked);
        }
        let data = self.jwt.decode::<TokenClaims>(token)?;
        Ok(data.claims)
    }

    async fn issue_authorization_code(&self, mut record: AuthorizationCode) -> TokenResult<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let code = URL_SAFE_NO_PAD.encode(bytes);

        let lifetime = self.config.authorization_code_lifetime;
        record.code = code.clone();
        record.expires_at = OffsetDateTime::now_utc().unix_timestamp() + duration_secs(lifetime);
        record.used = false;

        let payload = serde_json::to_vec(&record).map_err(|e| TokenError::Invalid(e.to_string()))?;
        self.store
            .set(&AuthorizationCode::storage_key(&code), payload, lifetime)
            .await?;

        tracing::debug!(client_id = %record.client_id, "Issued authorization code");
        Ok(code)
    }

    async fn redeem_authorization_code(&self, code: &str) -> TokenResult<AuthorizationCode> {
        let key = AuthorizationCode::storage_key(code);
        let Some(stored) = self.store.get(&key).await? else {
            return Err(TokenError::CodeNotFound);
        };
        let mut record: AuthorizationCode =
            serde_json::from_slice(&stored).map_err(|_| TokenError::CodeNotFound)?;

        if record.used {
            return Err(TokenError::CodeUsed);
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        if record.is_expired_at(now) {
            self.store.delete(&key).await?;
            return Err(TokenError::CodeExpired);
        }

        record.used = true;
        let flipped = serde_json::to_vec(&record).map_err(|e| TokenError::Invalid(e.to_string()))?;
        let remaining = clamp_ttl(Duration::from_secs((record.expires_at - now).unsigned_abs()));
        if !self
            .store
            .compare_and_swap(&key, &stored, flipped, remaining)
            .await?
        {
            tracing::warn!(client_id = %record.client_id, "Authorization code redeemed concurrently");
            return Err(TokenError::CodeUsed);
        }

        Ok(record)
    }

    async fn revoke(&self, token: &str) -> TokenResult<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = self.revocation_ttl(token);
        self.store
            .set(&revocation_key(token), now.to_string().into_bytes(), ttl)
            .await?;
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> TokenResult<bool> {
        Ok(self.store.exists(&revocation_key(token)).await?)
    }

    async fn consume_refresh(&self, token: &str) -> TokenResult<bool> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = self.revocation_ttl(token);
        Ok(self
            .store
            .set_if_absent(&revocation_key(token), now.to_string().into_bytes(), ttl)
            .await?)
    }

    fn jwks(&self) -> Jwks {
        self.jwt.jwks()
    }

    fn current_kid(&self) -> String {
        self.jwt.current_kid().to_string()
    }

    fn issuer(&self) -> &str {
        &self.config.issuer
    }

    fn access_token_lifetime(&self) -> Duration {
        self.config.access_token_lifetime
    }
}

/// Store key for a revoked token: `revoked:<sha256 hex>`.
#[must_use]
pub fn revocation_key(token: &str) -> String {
    format!("{REVOKED_PREFIX}{}", hex::encode(Sha256::digest(token.as_bytes())))
}

fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Reads `exp` from the payload segment without verifying the signature.
fn unverified_exp(token: &str) -> Option<i64> {
    #[derive(serde::Deserialize)]
    struct ExpOnly {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice::<ExpOnly>(&bytes).ok().map(|c| c.exp)
}
