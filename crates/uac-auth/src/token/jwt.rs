//! RS256 JWT signing and verification.
//!
//! [`SigningKeyPair`] holds the RSA key and its key id; [`JwtService`] signs
//! claims with a `kid` header and verifies tokens against the active key.
//!
//! ## Example
//!
//! ```ignore
//! use uac_auth::token::jwt::{JwtService, SigningKeyPair};
//!
//! let key_pair = SigningKeyPair::generate_rsa()?;
//! let jwt = JwtService::new(key_pair, "https://auth.example.com");
//!
//! let token = jwt.encode(&claims)?;
//! let decoded = jwt.decode::<TokenClaims>(&token)?;
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, decode_header,
    encode,
};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const RSA_BITS: usize = 2048;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The `iss` claim does not match.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// No key matches the token's `kid`.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found.
        kid: String,
    },

    /// Failed to generate a key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// JWKS Types
// ============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// RSA public key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "RSA".
    pub kty: String,

    /// Key use, always "sig".
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm, always "RS256".
    pub alg: String,

    /// Key ID.
    pub kid: String,

    /// Modulus (base64url, big-endian, unpadded).
    pub n: String,

    /// Public exponent (base64url, big-endian, unpadded).
    pub e: String,
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// An RSA key pair with its key id.
#[derive(Clone)]
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    n: Vec<u8>,
    e: Vec<u8>,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a fresh RSA-2048 key pair with a derived key id.
    ///
    /// # Errors
    /// Returns an error if key generation or PEM export fails.
    pub fn generate_rsa() -> Result<Self, JwtError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        Self::from_private_key(&private_key, None)
    }

    /// Loads a key pair from a PKCS#8 or PKCS#1 PEM private key.
    ///
    /// When `kid` is `None` the key id is derived from the public modulus.
    ///
    /// # Errors
    /// Returns an error if the PEM data is not an RSA private key.
    pub fn from_pem(private_pem: &str, kid: Option<String>) -> Result<Self, JwtError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        Self::from_private_key(&private_key, kid)
    }

    fn from_private_key(private_key: &RsaPrivateKey, kid: Option<String>) -> Result<Self, JwtError> {
        let public_key = RsaPublicKey::from(private_key);
        let n = public_key.n().to_bytes_be();
        let e = public_key.e().to_bytes_be();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let kid = kid.unwrap_or_else(|| derive_kid(&n));

        Ok(Self {
            kid,
            encoding_key,
            decoding_key,
            n,
            e,
        })
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            kid: self.kid.clone(),
            n: URL_SAFE_NO_PAD.encode(&self.n),
            e: URL_SAFE_NO_PAD.encode(&self.e),
        }
    }
}

/// Stable key id: the first 8 bytes of SHA-256 over the modulus, hex encoded.
fn derive_kid(modulus: &[u8]) -> String {
    let digest = Sha256::digest(modulus);
    hex::encode(&digest[..8])
}

// ============================================================================
// JWT Service
// ============================================================================

/// Signs and verifies RS256 tokens for one issuer.
///
/// `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct JwtService {
    signing_key: SigningKeyPair,
    issuer: String,
}

impl JwtService {
    /// Creates a new JWT service.
    #[must_use]
    pub fn new(signing_key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
        }
    }

    /// Encodes claims into a compact JWS.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.signing_key.kid.clone());

        encode(&header, claims, &self.signing_key.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Verifies signature, `exp` and `iss`, then decodes the claims.
    ///
    /// # Errors
    /// Returns `KeyNotFound` if the `kid` header names another key, and the
    /// mapped `jsonwebtoken` error for any other failure.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        let header = decode_header(token)?;
        if let Some(kid) = header.kid.as_deref()
            && kid != self.signing_key.kid
        {
            return Err(JwtError::key_not_found(kid));
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        decode(token, &self.signing_key.decoding_key, &validation).map_err(JwtError::from)
    }

    /// Returns the current signing key ID.
    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.signing_key.kid
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the JWKS holding the active public key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.signing_key.to_jwk()],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    const ISSUER: &str = "https://auth.example.com";

    fn service() -> JwtService {
        JwtService::new(SigningKeyPair::generate_rsa().unwrap(), ISSUER)
    }

    fn claims(exp_offset: i64) -> serde_json::Value {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        json!({ "sub": "user123", "iss": ISSUER, "iat": now, "exp": now + exp_offset })
    }

    #[test]
    fn test_encode_decode() {
        let service = service();
        let token = service.encode(&claims(3600)).unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(service.current_kid()));

        let decoded = service.decode::<serde_json::Value>(&token).unwrap();
        assert_eq!(decoded.claims["sub"], "user123");
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = service();
        let token = service.encode(&claims(-120)).unwrap();
        assert!(matches!(
            service.decode::<serde_json::Value>(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let key = SigningKeyPair::generate_rsa().unwrap();
        let ours = JwtService::new(key.clone(), ISSUER);
        let theirs = JwtService::new(key, "https://elsewhere.example.com");

        let token = theirs
            .encode(&json!({ "iss": "https://elsewhere.example.com", "exp": OffsetDateTime::now_utc().unix_timestamp() + 60 }))
            .unwrap();
        assert!(matches!(
            ours.decode::<serde_json::Value>(&token),
            Err(JwtError::InvalidIssuer)
        ));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let ours = service();
        let theirs = service();
        let token = theirs.encode(&claims(3600)).unwrap();
        assert!(matches!(
            ours.decode::<serde_json::Value>(&token),
            Err(JwtError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let service = service();
        let token = service.encode(&claims(3600)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(claims(7200).to_string());
        parts[1] = &forged;
        let tampered = parts.join(".");

        assert!(matches!(
            service.decode::<serde_json::Value>(&tampered),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_jwks_shape() {
        let service = service();
        let jwks = service.jwks();
        assert_eq!(jwks.keys.len(), 1);

        let jwk = serde_json::to_value(&jwks.keys[0]).unwrap();
        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["use"], "sig");
        assert_eq!(jwk["alg"], "RS256");
        assert_eq!(jwk["kid"], service.current_kid());
        // 65537
        assert_eq!(jwk["e"], "AQAB");
        assert!(!jwk["n"].as_str().unwrap().contains('='));
    }

    #[test]
    fn test_pem_round_trip_keeps_kid() {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();

        let derived = SigningKeyPair::from_pem(&pem, None).unwrap();
        let again = SigningKeyPair::from_pem(&pem, None).unwrap();
        assert_eq!(derived.kid, again.kid);

        let named = SigningKeyPair::from_pem(&pem, Some("key-1".into())).unwrap();
        assert_eq!(named.kid, "key-1");
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let err = SigningKeyPair::from_pem("not a key", None).unwrap_err();
        assert!(matches!(err, JwtError::InvalidKey { .. }));
    }
}
