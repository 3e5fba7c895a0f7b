//! PKCE (Proof Key for Code Exchange) implementation
//!
//! Implements RFC 7636 with both the `plain` and `S256` methods. When a
//! challenge arrives without a method, `plain` is assumed as the RFC requires.
//!
//! Verification is a pure function over the stored challenge, its method and
//! the presented verifier, so it can be exercised without any store.
//!
//! # Example
//!
//! ```
//! use uac_auth::oauth::pkce::{PkceChallengeMethod, s256_challenge, verify_pkce};
//!
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = s256_challenge(verifier);
//!
//! assert!(verify_pkce(&challenge, PkceChallengeMethod::S256, verifier).is_ok());
//! assert!(verify_pkce(&challenge, PkceChallengeMethod::S256, "wrong-verifier").is_err());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// The code was bound to a challenge but no verifier was presented.
    #[error("Missing code_verifier")]
    MissingVerifier,

    /// Unsupported challenge method (only `plain` and `S256` exist).
    #[error("Unsupported code_challenge_method: {0}")]
    UnsupportedMethod(String),

    /// PKCE verification failed (verifier doesn't match challenge).
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

impl PkceError {
    /// Create an `UnsupportedMethod` error.
    #[must_use]
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod(method.into())
    }
}

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PkceChallengeMethod {
    /// The challenge is the verifier itself.
    #[default]
    #[serde(rename = "plain")]
    Plain,
    /// SHA-256 hash, base64url encoded without padding.
    S256,
}

impl PkceChallengeMethod {
    /// Parse challenge method from string.
    ///
    /// An empty string resolves to `plain`.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything other than
    /// `plain` or `S256`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "" | "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::unsupported_method(other)),
        }
    }

    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Computes the S256 challenge for an arbitrary verifier string.
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verifies a presented `code_verifier` against a stored challenge.
///
/// `plain` compares the strings byte for byte; `S256` hashes the verifier
/// first. The verifier's shape is not checked here: a malformed verifier is
/// simply one that does not match.
///
/// # Errors
///
/// Returns `PkceError::VerificationFailed` if the verifier doesn't match.
pub fn verify_pkce(
    challenge: &str,
    method: PkceChallengeMethod,
    verifier: &str,
) -> Result<(), PkceError> {
    let matches = match method {
        PkceChallengeMethod::Plain => challenge == verifier,
        PkceChallengeMethod::S256 => s256_challenge(verifier) == challenge,
    };

    if matches {
        Ok(())
    } else {
        Err(PkceError::VerificationFailed)
    }
}

// =============================================================================
// Tests
// =============================================================================
