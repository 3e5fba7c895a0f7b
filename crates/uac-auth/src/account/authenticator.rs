//! Password authentication with failed-attempt lockout.
//!
//! Checks run in a fixed order: unknown account, lock, status, password. A
//! locked account is refused even when the password is correct.

use std::sync::Arc;

use time::OffsetDateTime;

use super::{Account, AccountError, AccountResult, AccountStorage};
use crate::config::LockoutConfig;
use crate::secret::{hash_secret, verify_secret};

/// Minimum password length accepted by [`is_password_strong`].
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// At least eight characters with an upper-case letter, a lower-case letter
/// and a digit.
#[must_use]
pub fn is_password_strong(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Verifies credentials and manages passwords for stored accounts.
pub struct PasswordAuthenticator {
    accounts: Arc<dyn AccountStorage>,
    lockout: LockoutConfig,
}

impl PasswordAuthenticator {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStorage>, lockout: LockoutConfig) -> Self {
        Self { accounts, lockout }
    }

    /// Authenticates by username.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown user or wrong password,
    /// `AccountLocked` while locked, `AccountDisabled` for inactive accounts.
    pub async fn authenticate(&self, username: &str, password: &str) -> AccountResult<Account> {
        let account = self
            .accounts
            .find_by_username(username)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        self.check_password(account, password).await
    }

    /// Authenticates by email. Same failure modes as [`authenticate`](Self::authenticate).
    ///
    /// # Errors
    ///
    /// See [`authenticate`](Self::authenticate).
    pub async fn authenticate_by_email(&self, email: &str, password: &str) -> AccountResult<Account> {
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        self.check_password(account, password).await
    }

    async fn check_password(&self, mut account: Account, password: &str) -> AccountResult<Account> {
        let now = OffsetDateTime::now_utc();
        if account.is_locked_at(now) {
            tracing::debug!(user_id = %account.id, "Login refused for locked account");
            return Err(AccountError::AccountLocked);
        }

        if !account.is_active() {
            return Err(AccountError::AccountDisabled);
        }

        // A lock that has run out starts a fresh counting window.
        let lock_expired = account.locked_until.is_some();
        if lock_expired {
            account.clear_lockout();
        }

        let matches = !account.password_hash.is_empty()
            && verify_secret(password, &account.password_hash).unwrap_or(false);

        if !matches {
            account.failed_login_count += 1;
            if account.failed_login_count >= self.lockout.max_failed_attempts {
                account.locked_until = Some(now + self.lockout.lock_duration);
                tracing::warn!(
                    user_id = %account.id,
                    failed_attempts = account.failed_login_count,
                    "Account locked after repeated failed logins"
                );
            }
            self.accounts.update(&account).await?;
            return Err(AccountError::InvalidCredentials);
        }

        if lock_expired || account.failed_login_count > 0 {
            account.clear_lockout();
            self.accounts.update(&account).await?;
        }

        Ok(account)
    }

    /// Changes a password after verifying the old one.
    ///
    /// # Errors
    ///
    /// `UserNotFound`, `InvalidCredentials` for a wrong old password, or
    /// `WeakPassword`.
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> AccountResult<()> {
        let mut account = self.load(user_id).await?;
        if !verify_secret(old_password, &account.password_hash).unwrap_or(false) {
            return Err(AccountError::InvalidCredentials);
        }
        if !is_password_strong(new_password) {
            return Err(AccountError::WeakPassword);
        }
        account.password_hash = hash_secret(new_password)?;
        self.accounts.update(&account).await
    }

    /// Administrative reset: sets a new password and clears any lockout.
    ///
    /// # Errors
    ///
    /// `UserNotFound` or `WeakPassword`.
    pub async fn reset_password(&self, user_id: &str, new_password: &str) -> AccountResult<()> {
        let mut account = self.load(user_id).await?;
        if !is_password_strong(new_password) {
            return Err(AccountError::WeakPassword);
        }
        account.password_hash = hash_secret(new_password)?;
        account.clear_lockout();
        self.accounts.update(&account).await
    }

    /// Clears the failed-attempt counter and lock.
    ///
    /// # Errors
    ///
    /// `UserNotFound`.
    pub async fn unlock_account(&self, user_id: &str) -> AccountResult<()> {
        let mut account = self.load(user_id).await?;
        account.clear_lockout();
        self.accounts.update(&account).await
    }

    async fn load(&self, user_id: &str) -> AccountResult<Account> {
        self.accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)
    }
}
