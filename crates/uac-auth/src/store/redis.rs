//! Redis-backed [`KeyValueStore`] for multi-instance deployments.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, Script};

use super::{KeyValueStore, StoreError, StoreResult, clamp_ttl};

/// Swaps the value only if it still equals ARGV[1]. Returns 1 on swap.
const COMPARE_AND_SWAP_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
    return 1
end
return 0
";

/// Store sharing state through Redis.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    cas_script: Script,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            cas_script: Script::new(COMPARE_AND_SWAP_SCRIPT),
        }
    }

    /// Returns `true` if a connection can be checked out of the pool.
    pub async fn is_available(&self) -> bool {
        self.pool.get().await.is_ok()
    }

    async fn conn(&self) -> StoreResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::unavailable(format!("redis pool: {e}")))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(clamp_ttl(ttl).as_millis()).unwrap_or(u64::MAX)
}

fn map_redis_error(key: &str, err: redis::RedisError) -> StoreError {
    if err.kind() == redis::ErrorKind::TypeError {
        StoreError::WrongType(key.to_string())
    } else {
        StoreError::unavailable(err.to_string())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| map_redis_error(key, e))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(key, e))?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(key, e))?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await.map_err(|e| map_redis_error(key, e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(|e| map_redis_error(key, e))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: Vec<u8>,
        ttl: Duration,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let swapped: i64 = self
            .cas_script
            .key(key)
            .arg(expected)
            .arg(new)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(key, e))?;
        Ok(swapped == 1)
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(key, e))?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.srem::<_, _, ()>(key, member)
            .await
            .map_err(|e| map_redis_error(key, e))
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.smembers(key)
            .await
            .map_err(|e| map_redis_error(key, e))
    }
}
