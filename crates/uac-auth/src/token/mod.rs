//! Token issuance, validation and revocation.
//!
//! This module provides:
//!
//! - RS256 signing and verification with a `kid` header ([`jwt`])
//! - Access, refresh and identity token claims ([`claims`])
//! - Single-use authorization code records ([`code`])
//! - The [`TokenService`] trait and its store-backed implementation

pub mod claims;
pub mod code;
pub mod jwt;
pub mod service;

pub use claims::{TokenClaims, TokenKind};
pub use code::AuthorizationCode;
pub use jwt::{Jwk, Jwks, JwtError, JwtService, SigningKeyPair};
pub use service::{JwtTokenService, TokenService};

use crate::store::StoreError;

/// Result alias for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Errors raised by the token service.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token is in the revocation set.
    #[error("Token has been revoked")]
    Revoked,

    /// The token's `exp` has passed.
    #[error("Token has expired")]
    Expired,

    /// The token is malformed or its claims are unusable.
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// The token was issued by someone else.
    #[error("Token issuer mismatch")]
    WrongIssuer,

    /// Signature verification failed, or no key matches the `kid`.
    #[error("Token signature verification failed")]
    BadSignature,

    /// No authorization code record exists.
    #[error("Authorization code not found")]
    CodeNotFound,

    /// The authorization code was already redeemed.
    #[error("Authorization code already used")]
    CodeUsed,

    /// The authorization code is past its expiry.
    #[error("Authorization code expired")]
    CodeExpired,

    /// Signing failed.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenError {
    /// Returns `true` for failures of the presented token itself, as opposed
    /// to infrastructure failures.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Revoked | Self::Expired | Self::Invalid(_) | Self::WrongIssuer | Self::BadSignature
        )
    }
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::Expired,
            JwtError::InvalidSignature | JwtError::KeyNotFound { .. } => Self::BadSignature,
            JwtError::InvalidIssuer => Self::WrongIssuer,
            JwtError::EncodingError { message }
            | JwtError::InvalidKey { message }
            | JwtError::KeyGenerationError { message } => Self::Signing(message),
            other => Self::Invalid(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_error_mapping() {
        assert!(matches!(
            TokenError::from(JwtError::Expired),
            TokenError::Expired
        ));
        assert!(matches!(
            TokenError::from(JwtError::key_not_found("k1")),
            TokenError::BadSignature
        ));
        assert!(matches!(
            TokenError::from(JwtError::InvalidIssuer),
            TokenError::WrongIssuer
        ));
        assert!(matches!(
            TokenError::from(JwtError::decoding_error("bad")),
            TokenError::Invalid(_)
        ));
    }

    #[test]
    fn test_validation_error_predicate() {
        assert!(TokenError::Revoked.is_validation_error());
        assert!(!TokenError::CodeUsed.is_validation_error());
        assert!(!TokenError::Store(StoreError::unavailable("down")).is_validation_error());
    }
}
