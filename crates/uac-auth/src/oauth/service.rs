//! OAuth 2.x / OpenID Connect protocol handler.
//!
//! [`OAuthService`] runs the authorization state machine and grant dispatch
//! over the token service, the application registry and the account store.
//! It never touches HTTP types; the `http` module adapts requests and
//! outcomes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::account::AccountStorage;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::oauth::authorize::{
    AuthorizeOutcome, AuthorizeRequest, code_redirect, error_redirect, implicit_redirect,
    login_redirect,
};
use crate::oauth::client::{Application, ApplicationLookup, OAuthProfile};
use crate::oauth::oidc::{DiscoveryDocument, UserInfo};
use crate::oauth::pkce::{PkceChallengeMethod, PkceError, verify_pkce};
use crate::oauth::token::{
    IntrospectRequest, IntrospectionResponse, RevokeRequest, TokenRequest, TokenResponse,
    grant_type,
};
use crate::oauth::validation::{parse_scopes, scopes_allowed};
use crate::token::{AuthorizationCode, Jwks, TokenClaims, TokenError, TokenKind, TokenService};

/// The protocol endpoints, independent of transport.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Runs the authorization endpoint checks for an optional signed-in
    /// subject. `original_uri` is the request URI, used for the login bounce.
    async fn authorize(
        &self,
        request: &AuthorizeRequest,
        subject: Option<&str>,
        original_uri: &str,
    ) -> AuthorizeOutcome;

    /// Dispatches on `grant_type`.
    async fn token(&self, request: TokenRequest) -> AuthResult<TokenResponse>;

    /// Revokes a token. Only a missing `token` parameter is an error.
    async fn revoke(&self, request: RevokeRequest) -> AuthResult<()>;

    /// Introspects a token. Every failure is reported as inactive.
    async fn introspect(&self, request: IntrospectRequest) -> IntrospectionResponse;

    /// Userinfo for an already validated access token.
    async fn userinfo(&self, claims: &TokenClaims) -> AuthResult<UserInfo>;

    fn discovery(&self) -> DiscoveryDocument;

    fn jwks(&self) -> Jwks;
}

/// Default [`ProtocolHandler`].
pub struct OAuthService {
    tokens: Arc<dyn TokenService>,
    applications: Arc<dyn ApplicationLookup>,
    accounts: Arc<dyn AccountStorage>,
    config: OAuthConfig,
}

impl OAuthService {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenService>,
        applications: Arc<dyn ApplicationLookup>,
        accounts: Arc<dyn AccountStorage>,
        config: OAuthConfig,
    ) -> Self {
        Self {
            tokens,
            applications,
            accounts,
            config,
        }
    }

    fn expires_in(&self) -> u64 {
        self.tokens.access_token_lifetime().as_secs()
    }

    /// Claims for a user acting through an application, enriched with the
    /// account's username and email when the account is known.
    async fn user_claims(
        &self,
        user_id: &str,
        application: &Application,
        scopes: Vec<String>,
    ) -> AuthResult<TokenClaims> {
        let mut claims = TokenClaims::for_user(user_id)
            .with_client(application.client_id.clone())
            .with_app(application.id.clone())
            .with_scopes(scopes);
        if let Some(org_id) = &application.org_id {
            claims = claims.with_org(org_id.clone());
        }
        if let Some(account) = self.accounts.find_by_id(user_id).await? {
            claims = claims.with_username(account.username);
            if let Some(email) = account.email {
                claims = claims.with_email(email);
            }
        }
        Ok(claims)
    }

    async fn active_application(&self, client_id: &str) -> AuthResult<Application> {
        match self.applications.get_by_client_id(client_id).await? {
            Some(app) if app.is_active() => Ok(app),
            Some(_) => Err(AuthError::invalid_client("client is disabled")),
            None => Err(AuthError::invalid_client("unknown client")),
        }
    }

    async fn authorization_code_grant(&self, request: TokenRequest) -> AuthResult<TokenResponse> {
        let code = non_empty(request.code.as_deref())
            .ok_or_else(|| AuthError::invalid_request("code is required"))?;

        let record = self.tokens.redeem_authorization_code(code).await?;
        let application = self.active_application(&record.client_id).await?;

        if let Some(client_id) = non_empty(request.client_id.as_deref()) {
            if client_id != record.client_id {
                return Err(AuthError::invalid_client("client_id does not match the code"));
            }
        }

        if let Some(secret) = non_empty(request.client_secret.as_deref()) {
            if !application.verify_client_secret(secret) {
                return Err(AuthError::invalid_client("client authentication failed"));
            }
        }

        if let Some(redirect_uri) = non_empty(request.redirect_uri.as_deref()) {
            if redirect_uri != record.redirect_uri {
                return Err(AuthError::invalid_grant("redirect_uri does not match the code"));
            }
        }

        if let Some(challenge) = non_empty(record.code_challenge.as_deref()) {
            let verifier = non_empty(request.code_verifier.as_deref())
                .ok_or(PkceError::MissingVerifier)?;
            let method = record.code_challenge_method.unwrap_or_default();
            verify_pkce(challenge, method, verifier).map_err(|e| {
                tracing::debug!(client_id = %record.client_id, "PKCE verification failed");
                AuthError::from(e)
            })?;
        }

        let claims = self
            .user_claims(&record.user_id, &application, record.scopes.clone())
            .await?;
        let scope = claims.scope_string();

        let access = self.tokens.issue_access(claims.clone())?;
        let refresh = self.tokens.issue_refresh(claims.clone())?;
        let mut response =
            TokenResponse::new(access, self.expires_in(), scope).with_refresh_token(refresh);

        if claims.has_scope("openid") {
            let identity = self
                .tokens
                .issue_identity(claims.with_nonce(record.nonce.clone()))?;
            response = response.with_id_token(identity);
        }

        tracing::info!(
            client_id = %record.client_id,
            user_id = %record.user_id,
            "Authorization code exchanged"
        );
        Ok(response)
    }

    async fn refresh_token_grant(&self, request: TokenRequest) -> AuthResult<TokenResponse> {
        let presented = non_empty(request.refresh_token.as_deref())
            .ok_or_else(|| AuthError::invalid_request("refresh_token is required"))?;

        let claims = match self.tokens.validate(presented).await {
            Ok(claims) => claims,
            Err(TokenError::Store(e)) => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Refresh token rejected");
                return Err(AuthError::invalid_grant("refresh token is invalid or expired"));
            }
        };

        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::invalid_grant("token is not a refresh token"));
        }

        if let Some(client_id) = non_empty(request.client_id.as_deref()) {
            if claims.client_id.as_deref() != Some(client_id) {
                return Err(AuthError::invalid_grant("refresh token was issued to another client"));
            }
        }

        if !self.tokens.consume_refresh(presented).await? {
            tracing::warn!(user_id = %claims.sub, "Refresh token rotated concurrently");
            return Err(AuthError::invalid_grant("refresh token is invalid or expired"));
        }

        let rotated = TokenClaims {
            aud: None,
            nonce: None,
            ..claims
        };
        let scope = rotated.scope_string();
        let access = self.tokens.issue_access(rotated.clone())?;
        let refresh = self.tokens.issue_refresh(rotated)?;

        Ok(TokenResponse::new(access, self.expires_in(), scope).with_refresh_token(refresh))
    }

    async fn client_credentials_grant(&self, request: TokenRequest) -> AuthResult<TokenResponse> {
        let (Some(client_id), Some(secret)) = (
            non_empty(request.client_id.as_deref()),
            non_empty(request.client_secret.as_deref()),
        ) else {
            return Err(AuthError::invalid_client("client credentials are required"));
        };

        let application = self.active_application(client_id).await?;
        if !application.verify_client_secret(secret) {
            tracing::warn!(client_id = %client_id, "Client secret mismatch");
            return Err(AuthError::invalid_client("client authentication failed"));
        }

        let scopes = parse_scopes(request.scope.as_deref().unwrap_or_default());
        if !scopes_allowed(&application.allowed_scopes, &scopes) {
            return Err(AuthError::invalid_scope("requested scope is not allowed"));
        }

        let mut claims = TokenClaims::for_client(client_id)
            .with_app(application.id.clone())
            .with_scopes(scopes);
        if let Some(org_id) = &application.org_id {
            claims = claims.with_org(org_id.clone());
        }
        let scope = claims.scope_string();
        let access = self.tokens.issue_access(claims)?;

        Ok(TokenResponse::new(access, self.expires_in(), scope))
    }

    /// Redirect to the client with an error, or render it when the redirect
    /// URI itself is unusable.
    fn redirect_error(request: &AuthorizeRequest, redirect_uri: &str, error: AuthError) -> AuthorizeOutcome {
        tracing::debug!(error = %error, "Authorization request rejected");
        match error_redirect(
            redirect_uri,
            error.oauth_error_code(),
            &error.to_string(),
            request.state.as_deref(),
        ) {
            Ok(location) => AuthorizeOutcome::Redirect(location),
            Err(_) => AuthorizeOutcome::Reject(AuthError::invalid_request("redirect_uri is not a valid URL")),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[async_trait]
impl ProtocolHandler for OAuthService {
    async fn authorize(
        &self,
        request: &AuthorizeRequest,
        subject: Option<&str>,
        original_uri: &str,
    ) -> AuthorizeOutcome {
        let (Some(response_type), Some(client_id), Some(redirect_uri)) = (
            non_empty(request.response_type.as_deref()),
            non_empty(request.client_id.as_deref()),
            non_empty(request.redirect_uri.as_deref()),
        ) else {
            return AuthorizeOutcome::Reject(AuthError::invalid_request(
                "response_type, client_id and redirect_uri are required",
            ));
        };

        let application = match self.active_application(client_id).await {
            Ok(app) => app,
            Err(e) => return AuthorizeOutcome::Reject(e),
        };

        if !application.has_redirect_uri(redirect_uri) {
            tracing::warn!(client_id = %client_id, redirect_uri = %redirect_uri, "Unregistered redirect_uri");
            return AuthorizeOutcome::Reject(AuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        let implicit = match response_type {
            "code" => false,
            "token"
                if application.oauth_profile == OAuthProfile::V2_0
                    && self.config.allow_implicit_flow =>
            {
                true
            }
            other => {
                return Self::redirect_error(
                    request,
                    redirect_uri,
                    AuthError::unsupported_response_type(other),
                );
            }
        };

        let challenge = non_empty(request.code_challenge.as_deref());
        if application.is_oauth21() && challenge.is_none() {
            return Self::redirect_error(
                request,
                redirect_uri,
                AuthError::invalid_request("code_challenge is required"),
            );
        }
        let pkce = match challenge {
            Some(challenge) => {
                match PkceChallengeMethod::parse(request.code_challenge_method.as_deref().unwrap_or_default()) {
                    Ok(method) => Some((challenge.to_string(), method)),
                    Err(e) => return Self::redirect_error(request, redirect_uri, e.into()),
                }
            }
            None => None,
        };

        let scopes = parse_scopes(request.scope.as_deref().unwrap_or_default());
        if !scopes_allowed(&application.allowed_scopes, &scopes) {
            return Self::redirect_error(
                request,
                redirect_uri,
                AuthError::invalid_scope("requested scope is not allowed"),
            );
        }

        let Some(user_id) = subject else {
            return AuthorizeOutcome::LoginRequired(login_redirect(&self.config.login_url, original_uri));
        };

        if implicit {
            let issued = match self.user_claims(user_id, &application, scopes).await {
                Ok(claims) => {
                    let scope = claims.scope_string();
                    self.tokens
                        .issue_access(claims)
                        .map(|token| (token, scope))
                        .map_err(AuthError::from)
                }
                Err(e) => Err(e),
            };
            return match issued {
                Ok((token, scope)) => {
                    match implicit_redirect(redirect_uri, &token, self.expires_in(), &scope, request.state.as_deref()) {
                        Ok(location) => AuthorizeOutcome::Redirect(location),
                        Err(_) => AuthorizeOutcome::Reject(AuthError::invalid_request(
                            "redirect_uri is not a valid URL",
                        )),
                    }
                }
                Err(e) => {
                    tracing::error!(client_id = %client_id, error = %e, "Failed to issue implicit token");
                    Self::redirect_error(request, redirect_uri, e)
                }
            };
        }

        let mut record = AuthorizationCode::new(client_id, user_id, redirect_uri, scopes)
            .with_nonce(request.nonce.clone().filter(|n| !n.is_empty()));
        if let Some((challenge, method)) = pkce {
            record = record.with_pkce(challenge, method);
        }

        let code = match self.tokens.issue_authorization_code(record).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(client_id = %client_id, error = %e, "Failed to issue authorization code");
                return Self::redirect_error(request, redirect_uri, e.into());
            }
        };

        match code_redirect(redirect_uri, &code, request.state.as_deref()) {
            Ok(location) => AuthorizeOutcome::Redirect(location),
            Err(_) => AuthorizeOutcome::Reject(AuthError::invalid_request("redirect_uri is not a valid URL")),
        }
    }

    async fn token(&self, request: TokenRequest) -> AuthResult<TokenResponse> {
        match request.grant_type.as_str() {
            grant_type::AUTHORIZATION_CODE => self.authorization_code_grant(request).await,
            grant_type::REFRESH_TOKEN => self.refresh_token_grant(request).await,
            grant_type::CLIENT_CREDENTIALS => self.client_credentials_grant(request).await,
            other => Err(AuthError::unsupported_grant_type(other)),
        }
    }

    async fn revoke(&self, request: RevokeRequest) -> AuthResult<()> {
        let token = non_empty(request.token.as_deref())
            .ok_or_else(|| AuthError::invalid_request("token is required"))?;
        if let Err(e) = self.tokens.revoke(token).await {
            tracing::error!(error = %e, "Failed to record token revocation");
        }
        Ok(())
    }

    async fn introspect(&self, request: IntrospectRequest) -> IntrospectionResponse {
        let Some(token) = non_empty(request.token.as_deref()) else {
            return IntrospectionResponse::inactive();
        };
        match self.tokens.validate(token).await {
            Ok(claims) => IntrospectionResponse::from_claims(&claims),
            Err(e) => {
                if matches!(e, TokenError::Store(_)) {
                    tracing::error!(error = %e, "Introspection store failure");
                }
                IntrospectionResponse::inactive()
            }
        }
    }

    async fn userinfo(&self, claims: &TokenClaims) -> AuthResult<UserInfo> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::invalid_token("token has no user subject"))?;
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::not_found("user not found"))?;
        Ok(UserInfo::from_account(&account, &claims.scopes))
    }

    fn discovery(&self) -> DiscoveryDocument {
        DiscoveryDocument::for_issuer(self.tokens.issuer())
    }

    fn jwks(&self) -> Jwks {
        self.tokens.jwks()
    }
}
