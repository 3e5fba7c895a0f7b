//! OAuth 2.0/2.1 authorization server and OpenID Connect provider.
//!
//! - [`authorize`] - authorization endpoint request and redirect builders
//! - [`client`] - registered applications and the [`ApplicationLookup`] seam
//! - [`oidc`] - discovery document and userinfo projection
//! - [`pkce`] - PKCE challenge/verifier implementation
//! - [`service`] - the [`ProtocolHandler`] state machine
//! - [`token`] - token, revocation and introspection wire types
//! - [`validation`] - pure scope and redirect URI checks
//!
//! # Example
//!
//! ```ignore
//! use uac_auth::oauth::{OAuthService, ProtocolHandler, TokenRequest};
//!
//! let handler = OAuthService::new(tokens, applications, accounts, config.oauth.clone());
//! let outcome = handler.authorize(&request, Some(user_id), "/oauth/authorize?...").await;
//! let response = handler.token(TokenRequest { grant_type: "authorization_code".into(), ..Default::default() }).await?;
//! ```

pub mod authorize;
pub mod client;
pub mod oidc;
pub mod pkce;
pub mod service;
pub mod token;
pub mod validation;

pub use authorize::{AuthorizeOutcome, AuthorizeRequest};
pub use client::{
    Application, ApplicationLookup, ApplicationStatus, MemoryApplicationStore, OAuthProfile,
};
pub use oidc::{DiscoveryDocument, UserInfo};
pub use pkce::{PkceChallengeMethod, PkceError, s256_challenge, verify_pkce};
pub use service::{OAuthService, ProtocolHandler};
pub use token::{
    IntrospectRequest, IntrospectionResponse, RevokeRequest, TokenRequest, TokenResponse,
    parse_basic_auth,
};
pub use validation::{parse_scopes, redirect_uri_registered, scopes_allowed};
