use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::ports::SessionStore;

/// Session store backed by Redis `SET EX` / `GET` / `DEL`.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis session store");

        let client = redis::Client::open(redis_url).map_err(|e| {
            LedgerError::Internal(format!("Failed to create Redis client: {e}"))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            LedgerError::Internal(format!("Failed to connect to Redis: {e}"))
        })?;

        info!("Connected to Redis session store");
        Ok(Self { conn })
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| LedgerError::Internal(format!("Redis PING failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        // SETEX has whole-second resolution and rejects zero
        let seconds = ttl.as_secs().max(1);
        debug!("Session SET (TTL: {}s)", seconds);

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| LedgerError::Internal(format!("Redis SETEX failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| LedgerError::Internal(format!("Redis GET failed: {e}")))?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| LedgerError::Internal(format!("Redis DEL failed: {e}")))?;
        Ok(())
    }
}
