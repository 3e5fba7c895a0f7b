//! CAS records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Prefix of ticket-granting ticket ids.
pub const TGT_PREFIX: &str = "TGT-";

/// Prefix of service ticket values.
pub const ST_PREFIX: &str = "ST-";

/// A signed-in browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt_id: Option<String>,
    #[serde(default)]
    pub device_info: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// Input to `create_session`. Unset id and expiry are filled in by the engine.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub id: Option<String>,
    pub user_id: String,
    pub tgt_id: Option<String>,
    pub device_info: String,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: Option<OffsetDateTime>,
}

impl NewSession {
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_tgt(mut self, tgt_id: impl Into<String>) -> Self {
        self.tgt_id = Some(tgt_id.into());
        self
    }

    #[must_use]
    pub fn with_client_info(
        mut self,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Ticket-granting ticket (`TGT-<uuid>`), held by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketGrantingTicket {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TicketGrantingTicket {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// Single-use service ticket (`ST-<uuid>`) bound to one service URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTicket {
    pub ticket: String,
    pub tgt_id: String,
    pub user_id: String,
    pub service: String,
    #[serde(default)]
    pub used: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ServiceTicket {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_json_shape() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            tgt_id: None,
            device_info: String::new(),
            ip_address: "127.0.0.1".into(),
            user_agent: "test".into(),
            expires_at: now + time::Duration::hours(1),
            created_at: now,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["created_at"], "2023-11-14T22:13:20Z");
        assert!(json.get("tgt_id").is_none());

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
        assert!(!back.is_expired_at(now));
        assert!(back.is_expired_at(now + time::Duration::hours(2)));
    }
}
