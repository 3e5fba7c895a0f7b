//! User accounts and password authentication.
//!
//! - [`Account`] - the credential-bearing user record
//! - [`AccountStorage`] - persistence seam, with [`MemoryAccountStorage`]
//! - [`PasswordAuthenticator`] - credential checks with failed-attempt lockout

pub mod authenticator;
pub mod model;
pub mod storage;

pub use authenticator::{PasswordAuthenticator, is_password_strong};
pub use model::{Account, AccountStatus};
pub use storage::{AccountStorage, MemoryAccountStorage};

/// Result alias for account operations.
pub type AccountResult<T> = Result<T, AccountError>;

/// Errors raised by account authentication and password management.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Unknown user or wrong password. The two are deliberately indistinguishable.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Too many failed attempts; the account is temporarily locked.
    #[error("Account is locked, try again later")]
    AccountLocked,

    /// The account is not active.
    #[error("Account is disabled")]
    AccountDisabled,

    /// No account with the given id.
    #[error("User not found")]
    UserNotFound,

    /// The new password does not meet the strength policy.
    #[error("Password must be at least 8 characters with upper case, lower case and a digit")]
    WeakPassword,

    /// Hashing failed or a stored hash is malformed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// The account store failed.
    #[error("Account storage error: {0}")]
    Storage(String),
}

impl From<argon2::password_hash::Error> for AccountError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Hashing(err.to_string())
    }
}
