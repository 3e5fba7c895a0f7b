//! Shared TTL-indexed key-value store.
//!
//! Every piece of mutable protocol state (authorization codes, revoked
//! tokens, sessions, CAS tickets) lives behind [`KeyValueStore`]. Services
//! serialize their records to bytes and rely on the store for three things:
//!
//! - per-key TTL, so records disappear once they can no longer matter
//! - set membership, for the per-user session index
//! - an atomic compare-and-swap, which is how single-use flips are made safe
//!   under concurrent redemption
//!
//! # Implementations
//!
//! - [`MemoryStore`]: in-process `DashMap`, per-key atomicity via entry locks
//! - `RedisStore` (feature `redis-store`): deadpool-redis pool, compare-and-swap
//!   runs as a Lua script

pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use self::redis::RedisStore;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`KeyValueStore`] backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A key holds a value of a different kind (plain value vs. set).
    #[error("Wrong value type for key: {0}")]
    WrongType(String),
}

impl StoreError {
    /// Create an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// A shared key-value store with per-key expiry.
///
/// Implementations must make [`compare_and_swap`](Self::compare_and_swap)
/// atomic per key: of several concurrent callers presenting the same
/// `expected` bytes, at most one may observe `true`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes a value with a time-to-live, replacing any existing value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Writes a value only if the key is absent (or expired).
    ///
    /// Returns `true` if the value was written.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<bool>;

    /// Deletes a key. Returns `true` if a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Returns `true` if the key exists and has not expired.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Replaces the value at `key` with `new` only if it currently equals
    /// `expected`. The new value gets `ttl`.
    ///
    /// Returns `true` if the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: Vec<u8>,
        ttl: Duration,
    ) -> StoreResult<bool>;

    /// Adds a member to the set at `key` and refreshes the set's TTL.
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()>;

    /// Removes a member from the set at `key`.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Lists the members of the set at `key`. A missing set is empty.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;
}

/// Clamps a TTL to at least one second.
///
/// Backends reject zero TTLs, and a record that is about to expire should
/// still be written so the service can observe and evict it.
#[must_use]
pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.max(Duration::from_secs(1))
}
