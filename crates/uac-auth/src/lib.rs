//! # uac-auth
//!
//! Identity engine of the unified auth center.
//!
//! This crate provides:
//! - RS256 token issuance, validation and revocation
//! - An OAuth 2.0 / 2.1 authorization server with OpenID Connect
//! - CAS single sign-on with sessions, TGTs and service tickets
//! - Role-based access control
//! - Password authentication with failed-attempt lockout
//! - Axum extractors, gates and handlers exposing all of the above
//!
//! ## Modules
//!
//! - [`config`] - lifetimes, lockout policy and signing settings
//! - [`store`] - the shared TTL key-value store
//! - [`token`] - JWT signing and the [`TokenService`](token::TokenService)
//! - [`oauth`] - the OAuth/OIDC [`ProtocolHandler`](oauth::ProtocolHandler)
//! - [`cas`] - the CAS [`TicketEngine`](cas::TicketEngine)
//! - [`rbac`] - the [`RbacEngine`](rbac::RbacEngine)
//! - [`account`] - accounts and the password authenticator
//! - [`middleware`] - the HTTP auth gate
//! - [`http`] - Axum handlers and the router

pub mod account;
pub mod cas;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod oauth;
pub mod rbac;
pub mod secret;
pub mod store;
pub mod token;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{AppState, router};
pub use middleware::{AdminAuth, AuthContext, AuthState, BearerAuth, OptionalBearerAuth};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use uac_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::account::{
        Account, AccountStatus, AccountStorage, MemoryAccountStorage, PasswordAuthenticator,
    };
    pub use crate::cas::{CasService, TicketEngine};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{AppState, router};
    pub use crate::middleware::{
        AdminAuth, AuthContext, AuthState, BearerAuth, OptionalBearerAuth, PermissionGate,
        RoleGate, require_permission, require_role,
    };
    pub use crate::oauth::{
        Application, ApplicationLookup, MemoryApplicationStore, OAuthService, ProtocolHandler,
    };
    pub use crate::rbac::{MemoryRbacStorage, RbacEngine, RbacService};
    pub use crate::store::{KeyValueStore, MemoryStore};
    pub use crate::token::{JwtService, JwtTokenService, SigningKeyPair, TokenClaims, TokenService};
}
