//! Account persistence seam.
//!
//! The relational user store is an external collaborator; this trait is all
//! authentication needs from it. [`MemoryAccountStorage`] backs tests and
//! local runs.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Account, AccountError, AccountResult};

/// Lookup and update of accounts.
#[async_trait]
pub trait AccountStorage: Send + Sync {
    async fn find_by_id(&self, id: &str) -> AccountResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> AccountResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> AccountResult<Option<Account>>;

    /// Replaces a stored account. Fails with `UserNotFound` if absent.
    async fn update(&self, account: &Account) -> AccountResult<()>;
}

/// In-memory account store keyed by id.
#[derive(Debug, Default)]
pub struct MemoryAccountStorage {
    accounts: DashMap<String, Account>,
}

impl MemoryAccountStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    fn find_where(&self, predicate: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl AccountStorage for MemoryAccountStorage {
    async fn find_by_id(&self, id: &str) -> AccountResult<Option<Account>> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> AccountResult<Option<Account>> {
        Ok(self.find_where(|a| a.username == username))
    }

    async fn find_by_email(&self, email: &str) -> AccountResult<Option<Account>> {
        Ok(self.find_where(|a| a.email.as_deref() == Some(email)))
    }

    async fn update(&self, account: &Account) -> AccountResult<()> {
        match self.accounts.get_mut(&account.id) {
            Some(mut entry) => {
                *entry = account.clone();
                Ok(())
            }
            None => Err(AccountError::UserNotFound),
        }
    }
}
