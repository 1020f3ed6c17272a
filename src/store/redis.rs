//! Redis-реализации: сессии бронирования и кеш поиска.

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use uuid::Uuid;

use crate::error::{FerryError, FerryResult};
use crate::models::FerryBookingSession;

use super::{SearchCache, SessionStore};

/// Физический TTL ключа сессии больше логического `expires_at`:
/// сверка опоздавшего платежа должна успеть прочитать истёкшую сессию
/// и записать провальную бронь под возврат средств.
const EXPIRED_READ_GRACE_SECS: i64 = 3600;

pub async fn connect(redis_url: &str) -> redis::RedisResult<MultiplexedConnection> {
    let client = Client::open(redis_url)?;
    client.get_multiplexed_tokio_connection().await
}

fn session_key(session_id: Uuid) -> String {
    format!("ferry:session:{}", session_id)
}

/* ---------- sessions ---------- */

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, session: &FerryBookingSession) -> FerryResult<()> {
        let payload = serde_json::to_string(session)
            .map_err(|e| FerryError::Store(format!("session serialize: {e}")))?;
        let remaining = (session.expires_at - Utc::now()).num_seconds().max(0);
        let ttl = (remaining + EXPIRED_READ_GRACE_SECS) as u64;

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(session_key(session.session_id), payload, ttl)
            .await?;
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> FerryResult<Option<FerryBookingSession>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(session_key(session_id)).await?;
        match raw {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|e| FerryError::Store(format!("session decode: {e}")))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: Uuid) -> FerryResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(session_key(session_id)).await?;
        Ok(())
    }
}

/* ---------- search cache ---------- */

#[derive(Clone)]
pub struct RedisSearchCache {
    conn: MultiplexedConnection,
}

impl RedisSearchCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SearchCache for RedisSearchCache {
    async fn get(&self, key: &str) -> FerryResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> FerryResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }
}
