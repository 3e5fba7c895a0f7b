//! CAS single sign-on: sessions, ticket-granting tickets and service tickets.
//!
//! All state lives in the shared [`KeyValueStore`](crate::store::KeyValueStore)
//! under these keys:
//!
//! | Key | Value |
//! |-----|-------|
//! | `session:<id>` | [`Session`] JSON |
//! | `user_sessions:<user>` | set of session ids |
//! | `tgt:<id>` | [`TicketGrantingTicket`] JSON |
//! | `st:<ticket>` | [`ServiceTicket`] JSON |

pub mod model;
pub mod service;

pub use model::{NewSession, ServiceTicket, Session, TicketGrantingTicket};
pub use service::{CasService, TicketEngine};

use crate::store::StoreError;

/// Result alias for CAS operations.
pub type CasResult<T> = Result<T, CasError>;

/// Errors raised by the ticket engine.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    /// The requested expiry is not in the future.
    #[error("Session expiry must be in the future")]
    InvalidSessionExpiry,

    #[error("Ticket-granting ticket not found")]
    TgtNotFound,

    #[error("Ticket-granting ticket expired")]
    TgtExpired,

    #[error("Service ticket not found")]
    StNotFound,

    #[error("Service ticket expired")]
    StExpired,

    #[error("Service ticket already used")]
    StAlreadyUsed,

    /// The ticket was minted for another service.
    #[error("Service ticket was issued for a different service")]
    ServiceMismatch,

    #[error("Ticket serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for CasError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
