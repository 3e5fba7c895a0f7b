//! Store-backed CAS ticket engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewSession, ST_PREFIX, ServiceTicket, Session, TGT_PREFIX, TicketGrantingTicket};
use super::{CasError, CasResult};
use crate::config::CasConfig;
use crate::store::{KeyValueStore, clamp_ttl};

const SESSION_PREFIX: &str = "session:";
const USER_SESSIONS_PREFIX: &str = "user_sessions:";
const TGT_KEY_PREFIX: &str = "tgt:";
const ST_KEY_PREFIX: &str = "st:";

/// Slack added to the user session index TTL beyond the longest session.
const USER_INDEX_SLACK: Duration = Duration::from_secs(3600);

/// Sessions, ticket-granting tickets and service tickets.
#[async_trait]
pub trait TicketEngine: Send + Sync {
    /// Stores a session and indexes it under its user.
    async fn create_session(&self, session: NewSession) -> CasResult<Session>;

    async fn get_session(&self, session_id: &str) -> CasResult<Session>;

    /// Removes a session and its index entry. Idempotent.
    async fn delete_session(&self, session_id: &str) -> CasResult<()>;

    /// Removes every session of a user. TGTs are left alone.
    async fn delete_sessions_by_user(&self, user_id: &str) -> CasResult<()>;

    /// Live sessions of a user; stale index entries are pruned.
    async fn list_sessions_by_user(&self, user_id: &str) -> CasResult<Vec<Session>>;

    async fn create_tgt(&self, user_id: &str, session_id: &str) -> CasResult<TicketGrantingTicket>;

    async fn get_tgt(&self, tgt_id: &str) -> CasResult<TicketGrantingTicket>;

    /// CAS logout.
    async fn delete_tgt(&self, tgt_id: &str) -> CasResult<()>;

    /// Mints a service ticket from a live TGT.
    async fn create_st(&self, tgt_id: &str, service: &str) -> CasResult<ServiceTicket>;

    /// Consumes a service ticket for exactly the service it was minted for.
    async fn validate_st(&self, ticket: &str, service: &str) -> CasResult<ServiceTicket>;
}

/// [`TicketEngine`] over a [`KeyValueStore`].
pub struct CasService {
    store: Arc<dyn KeyValueStore>,
    config: CasConfig,
}

impl CasService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: CasConfig) -> Self {
        Self { store, config }
    }

    fn session_key(session_id: &str) -> String {
        format!("{SESSION_PREFIX}{session_id}")
    }

    fn user_sessions_key(user_id: &str) -> String {
        format!("{USER_SESSIONS_PREFIX}{user_id}")
    }

    fn tgt_key(tgt_id: &str) -> String {
        format!("{TGT_KEY_PREFIX}{tgt_id}")
    }

    fn st_key(ticket: &str) -> String {
        format!("{ST_KEY_PREFIX}{ticket}")
    }

    async fn load<T: serde::de::DeserializeOwned>(&self, key: &str) -> CasResult<Option<(T, Vec<u8>)>> {
        match self.store.get(key).await? {
            Some(bytes) => Ok(Some((serde_json::from_slice(&bytes)?, bytes))),
            None => Ok(None),
        }
    }
}

fn remaining(expires_at: OffsetDateTime, now: OffsetDateTime) -> Duration {
    let seconds = (expires_at - now).whole_seconds();
    clamp_ttl(Duration::from_secs(u64::try_from(seconds).unwrap_or(0)))
}

fn after(now: OffsetDateTime, lifetime: Duration) -> OffsetDateTime {
    now.saturating_add(time::Duration::try_from(lifetime).unwrap_or(time::Duration::MAX))
}

#[async_trait]
impl TicketEngine for CasService {
    async fn create_session(&self, new: NewSession) -> CasResult<Session> {
        let now = OffsetDateTime::now_utc();
        let expires_at = new
            .expires_at
            .unwrap_or_else(|| after(now, self.config.session_lifetime));
        if expires_at <= now {
            return Err(CasError::InvalidSessionExpiry);
        }

        let session = Session {
            id: new
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: new.user_id,
            tgt_id: new.tgt_id,
            device_info: new.device_info,
            ip_address: new.ip_address,
            user_agent: new.user_agent,
            expires_at,
            created_at: now,
        };

        let ttl = remaining(expires_at, now);
        self.store
            .set(&Self::session_key(&session.id), serde_json::to_vec(&session)?, ttl)
            .await?;
        self.store
            .set_add(
                &Self::user_sessions_key(&session.user_id),
                &session.id,
                ttl.max(self.config.session_lifetime) + USER_INDEX_SLACK,
            )
            .await?;

        tracing::debug!(session_id = %session.id, user_id = %session.user_id, "Session created");
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> CasResult<Session> {
        let key = Self::session_key(session_id);
        let Some((session, _)) = self.load::<Session>(&key).await? else {
            return Err(CasError::SessionNotFound);
        };

        if session.is_expired_at(OffsetDateTime::now_utc()) {
            self.store.delete(&key).await?;
            self.store
                .set_remove(&Self::user_sessions_key(&session.user_id), session_id)
                .await?;
            return Err(CasError::SessionExpired);
        }

        Ok(session)
    }

    async fn delete_session(&self, session_id: &str) -> CasResult<()> {
        let session = match self.get_session(session_id).await {
            Ok(session) => Some(session),
            Err(CasError::SessionNotFound | CasError::SessionExpired) => None,
            Err(e) => return Err(e),
        };

        self.store.delete(&Self::session_key(session_id)).await?;
        if let Some(session) = session {
            self.store
                .set_remove(&Self::user_sessions_key(&session.user_id), session_id)
                .await?;
        }
        Ok(())
    }

    async fn delete_sessions_by_user(&self, user_id: &str) -> CasResult<()> {
        let index = Self::user_sessions_key(user_id);
        let session_ids = self.store.set_members(&index).await?;
        for session_id in &session_ids {
            self.store.delete(&Self::session_key(session_id)).await?;
        }
        self.store.delete(&index).await?;

        tracing::info!(user_id = %user_id, count = session_ids.len(), "Deleted user sessions");
        Ok(())
    }

    async fn list_sessions_by_user(&self, user_id: &str) -> CasResult<Vec<Session>> {
        let index = Self::user_sessions_key(user_id);
        let mut sessions = Vec::new();
        for session_id in self.store.set_members(&index).await? {
            match self.get_session(&session_id).await {
                Ok(session) => sessions.push(session),
                Err(CasError::SessionNotFound | CasError::SessionExpired) => {
                    self.store.set_remove(&index, &session_id).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sessions)
    }

    async fn create_tgt(&self, user_id: &str, session_id: &str) -> CasResult<TicketGrantingTicket> {
        let now = OffsetDateTime::now_utc();
        let tgt = TicketGrantingTicket {
            id: format!("{TGT_PREFIX}{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            expires_at: after(now, self.config.tgt_lifetime),
            created_at: now,
        };

        self.store
            .set(
                &Self::tgt_key(&tgt.id),
                serde_json::to_vec(&tgt)?,
                clamp_ttl(self.config.tgt_lifetime),
            )
            .await?;
        Ok(tgt)
    }

    async fn get_tgt(&self, tgt_id: &str) -> CasResult<TicketGrantingTicket> {
        let key = Self::tgt_key(tgt_id);
        let Some((tgt, _)) = self.load::<TicketGrantingTicket>(&key).await? else {
            return Err(CasError::TgtNotFound);
        };

        if tgt.is_expired_at(OffsetDateTime::now_utc()) {
            self.store.delete(&key).await?;
            return Err(CasError::TgtExpired);
        }

        Ok(tgt)
    }

    async fn delete_tgt(&self, tgt_id: &str) -> CasResult<()> {
        self.store.delete(&Self::tgt_key(tgt_id)).await?;
        Ok(())
    }

    async fn create_st(&self, tgt_id: &str, service: &str) -> CasResult<ServiceTicket> {
        let tgt = self.get_tgt(tgt_id).await?;

        let now = OffsetDateTime::now_utc();
        let st = ServiceTicket {
            ticket: format!("{ST_PREFIX}{}", Uuid::new_v4()),
            tgt_id: tgt.id,
            user_id: tgt.user_id,
            service: service.to_string(),
            used: false,
            expires_at: after(now, self.config.st_lifetime),
            created_at: now,
        };

        self.store
            .set(
                &Self::st_key(&st.ticket),
                serde_json::to_vec(&st)?,
                clamp_ttl(self.config.st_lifetime),
            )
            .await?;

        tracing::debug!(user_id = %st.user_id, service = %service, "Service ticket issued");
        Ok(st)
    }

    async fn validate_st(&self, ticket: &str, service: &str) -> CasResult<ServiceTicket> {
        let key = Self::st_key(ticket);
        let Some((mut st, stored)) = self.load::<ServiceTicket>(&key).await? else {
            return Err(CasError::StNotFound);
        };

        let now = OffsetDateTime::now_utc();
        if st.is_expired_at(now) {
            self.store.delete(&key).await?;
            return Err(CasError::StExpired);
        }

        if st.service != service {
            tracing::warn!(expected = %st.service, presented = %service, "Service ticket presented for another service");
            return Err(CasError::ServiceMismatch);
        }

        if st.used {
            return Err(CasError::StAlreadyUsed);
        }

        st.used = true;
        let flipped = serde_json::to_vec(&st)?;
        if !self
            .store
            .compare_and_swap(&key, &stored, flipped, remaining(st.expires_at, now))
            .await?
        {
            return Err(CasError::StAlreadyUsed);
        }

        Ok(st)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const SERVICE_A: &str = "https://a.example.com/";
    const SERVICE_B: &str = "https://b.example.com/";

    fn engine() -> (CasService, MemoryStore) {
        let store = MemoryStore::new();
        (
            CasService::new(Arc::new(store.clone()), CasConfig::default()),
            store,
        )
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (cas, store) = engine();
        let session = cas
            .create_session(NewSession::for_user("u1").with_client_info("10.0.0.1", "curl"))
            .await
            .unwrap();
        assert!(!session.id.is_empty());
        assert_eq!(session.ip_address, "10.0.0.1");

        let fetched = cas.get_session(&session.id).await.unwrap();
        assert_eq!(fetched, session);
        assert_eq!(
            store.set_members("user_sessions:u1").await.unwrap(),
            vec![session.id.clone()]
        );

        cas.delete_session(&session.id).await.unwrap();
        cas.delete_session(&session.id).await.unwrap();
        assert!(matches!(
            cas.get_session(&session.id).await,
            Err(CasError::SessionNotFound)
        ));
        assert!(store.set_members("user_sessions:u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_keeps_supplied_id_and_rejects_past_expiry() {
        let (cas, _) = engine();
        let session = cas
            .create_session(NewSession::for_user("u1").with_id("fixed"))
            .await
            .unwrap();
        assert_eq!(session.id, "fixed");

        let past = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        assert!(matches!(
            cas.create_session(NewSession::for_user("u1").with_expiry(past)).await,
            Err(CasError::InvalidSessionExpiry)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_evicted() {
        let (cas, store) = engine();
        let now = OffsetDateTime::now_utc();
        let stale = Session {
            id: "old".into(),
            user_id: "u1".into(),
            tgt_id: None,
            device_info: String::new(),
            ip_address: String::new(),
            user_agent: String::new(),
            expires_at: now - time::Duration::seconds(5),
            created_at: now - time::Duration::hours(1),
        };
        store
            .set("session:old", serde_json::to_vec(&stale).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_add("user_sessions:u1", "old", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            cas.get_session("old").await,
            Err(CasError::SessionExpired)
        ));
        assert!(!store.exists("session:old").await.unwrap());
        assert!(store.set_members("user_sessions:u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_prunes_and_delete_by_user() {
        let (cas, store) = engine();
        let a = cas.create_session(NewSession::for_user("u1")).await.unwrap();
        let b = cas.create_session(NewSession::for_user("u1")).await.unwrap();
        cas.create_session(NewSession::for_user("u2")).await.unwrap();

        store.delete(&format!("session:{}", b.id)).await.unwrap();
        let listed = cas.list_sessions_by_user("u1").await.unwrap();
        assert_eq!(listed, vec![a.clone()]);
        assert_eq!(
            store.set_members("user_sessions:u1").await.unwrap(),
            vec![a.id.clone()]
        );

        let tgt = cas.create_tgt("u1", &a.id).await.unwrap();
        cas.delete_sessions_by_user("u1").await.unwrap();
        assert!(cas.list_sessions_by_user("u1").await.unwrap().is_empty());
        assert_eq!(cas.list_sessions_by_user("u2").await.unwrap().len(), 1);
        assert!(cas.get_tgt(&tgt.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_tgt_lifecycle() {
        let (cas, _) = engine();
        let tgt = cas.create_tgt("u1", "s1").await.unwrap();
        assert!(tgt.id.starts_with("TGT-"));
        assert_eq!(cas.get_tgt(&tgt.id).await.unwrap(), tgt);

        cas.delete_tgt(&tgt.id).await.unwrap();
        assert!(matches!(
            cas.get_tgt(&tgt.id).await,
            Err(CasError::TgtNotFound)
        ));
        assert!(matches!(
            cas.create_st(&tgt.id, SERVICE_A).await,
            Err(CasError::TgtNotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_tgt_is_evicted() {
        let (cas, store) = engine();
        let now = OffsetDateTime::now_utc();
        let tgt = TicketGrantingTicket {
            id: "TGT-old".into(),
            user_id: "u1".into(),
            session_id: "s1".into(),
            expires_at: now - time::Duration::seconds(1),
            created_at: now - time::Duration::hours(8),
        };
        store
            .set("tgt:TGT-old", serde_json::to_vec(&tgt).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            cas.get_tgt("TGT-old").await,
            Err(CasError::TgtExpired)
        ));
        assert!(!store.exists("tgt:TGT-old").await.unwrap());
    }

    #[tokio::test]
    async fn test_service_ticket_validates_once() {
        let (cas, _) = engine();
        let tgt = cas.create_tgt("u1", "s1").await.unwrap();
        let st = cas.create_st(&tgt.id, SERVICE_A).await.unwrap();
        assert!(st.ticket.starts_with("ST-"));
        assert_eq!(st.user_id, "u1");

        let validated = cas.validate_st(&st.ticket, SERVICE_A).await.unwrap();
        assert!(validated.used);
        assert_eq!(validated.user_id, "u1");

        assert!(matches!(
            cas.validate_st(&st.ticket, SERVICE_A).await,
            Err(CasError::StAlreadyUsed)
        ));
        assert!(matches!(
            cas.validate_st(&st.ticket, SERVICE_B).await,
            Err(CasError::ServiceMismatch)
        ));
    }

    #[tokio::test]
    async fn test_service_mismatch_does_not_consume() {
        let (cas, _) = engine();
        let tgt = cas.create_tgt("u1", "s1").await.unwrap();
        let st = cas.create_st(&tgt.id, SERVICE_A).await.unwrap();

        assert!(matches!(
            cas.validate_st(&st.ticket, SERVICE_B).await,
            Err(CasError::ServiceMismatch)
        ));
        cas.validate_st(&st.ticket, SERVICE_A).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_and_expired_service_tickets() {
        let (cas, store) = engine();
        assert!(matches!(
            cas.validate_st("ST-missing", SERVICE_A).await,
            Err(CasError::StNotFound)
        ));

        let now = OffsetDateTime::now_utc();
        let st = ServiceTicket {
            ticket: "ST-old".into(),
            tgt_id: "TGT-x".into(),
            user_id: "u1".into(),
            service: SERVICE_A.into(),
            used: false,
            expires_at: now - time::Duration::seconds(1),
            created_at: now - time::Duration::minutes(10),
        };
        store
            .set("st:ST-old", serde_json::to_vec(&st).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            cas.validate_st("ST-old", SERVICE_A).await,
            Err(CasError::StExpired)
        ));
        assert!(!store.exists("st:ST-old").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_validation_has_one_winner() {
        let (cas, _) = engine();
        let cas = Arc::new(cas);
        let tgt = cas.create_tgt("u1", "s1").await.unwrap();
        let st = cas.create_st(&tgt.id, SERVICE_A).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cas = Arc::clone(&cas);
            let ticket = st.ticket.clone();
            handles.push(tokio::spawn(async move {
                cas.validate_st(&ticket, SERVICE_A).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(CasError::StAlreadyUsed) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
    }
}
