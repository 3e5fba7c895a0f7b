//! Account record.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Disabled,
    Pending,
}

/// A user able to authenticate with a password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Argon2 PHC string. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password_hash: String,

    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_verified: bool,

    #[serde(default, skip_serializing)]
    pub failed_login_count: u32,

    #[serde(default, skip_serializing, with = "time::serde::rfc3339::option")]
    pub locked_until: Option<OffsetDateTime>,
}

impl Account {
    /// An active account with a fresh uuid and no password set.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: None,
            phone: None,
            display_name: None,
            avatar_url: None,
            password_hash: String::new(),
            status: AccountStatus::Active,
            email_verified: false,
            phone_verified: false,
            failed_login_count: 0,
            locked_until: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = hash.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Returns `true` while `now` is before `locked_until`.
    #[must_use]
    pub fn is_locked_at(&self, now: OffsetDateTime) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Clears the failed-attempt counter and any lock.
    pub fn clear_lockout(&mut self) {
        self.failed_login_count = 0;
        self.locked_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_window() {
        let now = OffsetDateTime::now_utc();
        let mut account = Account::new("alice");
        assert!(!account.is_locked_at(now));

        account.locked_until = Some(now + time::Duration::minutes(15));
        assert!(account.is_locked_at(now));
        assert!(!account.is_locked_at(now + time::Duration::minutes(16)));

        account.clear_lockout();
        assert!(!account.is_locked_at(now));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let account = Account::new("alice").with_password_hash("$argon2id$x");
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("failed_login_count").is_none());
        assert_eq!(json["status"], "active");
    }
}
