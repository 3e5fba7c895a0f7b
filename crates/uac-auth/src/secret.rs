//! Credential generation and Argon2 hashing.
//!
//! Client secrets and user passwords are stored as Argon2id PHC strings,
//! salted from `OsRng` with default cost parameters.
//!
//! # Example
//!
//! ```
//! use uac_auth::secret::{generate_client_secret, hash_secret, verify_secret};
//!
//! let secret = generate_client_secret();
//! let hash = hash_secret(&secret).unwrap();
//!
//! assert!(verify_secret(&secret, &hash).unwrap());
//! assert!(!verify_secret("guess", &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;

/// Generates a client id: 24 random bytes, base64url without padding.
#[must_use]
pub fn generate_client_id() -> String {
    let bytes: [u8; 24] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a client secret: 32 random bytes, base64url without padding.
#[must_use]
pub fn generate_client_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hashes a secret or password into a PHC string.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verifies a secret against a stored PHC string.
///
/// `Ok(false)` on mismatch; `Err` only if the stored hash is malformed.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if `hash` is not a PHC string.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_values_are_url_safe() {
        let id = generate_client_id();
        let secret = generate_client_secret();
        assert_eq!(id.len(), 32);
        assert_eq!(secret.len(), 43);
        assert!(
            secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(generate_client_secret(), secret);
    }

    #[test]
    fn test_hash_is_argon2id() {
        let hash = hash_secret("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify() {
        let hash = hash_secret("s3cret").unwrap();
        assert!(verify_secret("s3cret", &hash).unwrap());
        assert!(!verify_secret("wrong", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_secret("s3cret").unwrap();
        let second = hash_secret("s3cret").unwrap();
        assert_ne!(first, second);
        assert!(verify_secret("s3cret", &second).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_secret("s3cret", "plaintext").is_err());
    }
}
