//! Redis primary backend.
//!
//! Thin async wrapper over a multiplexed connection. Every operation
//! returns `Result<_, CacheError>`; the failover decision lives in
//! [`crate::layer::CacheLayer`], not here.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{info, warn};

use crate::error::CacheError;

#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connect with bounded retry. Returns `Err` once all attempts fail;
    /// the caller decides whether to run on the fallback map instead.
    pub async fn connect(
        url: &str,
        attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;

        let mut last_err = None;
        for attempt in 1..=attempts.max(1) {
            match client.get_multiplexed_tokio_connection().await {
                Ok(conn) => {
                    info!(url = %url, attempt, "redis connected");
                    return Ok(Self { conn });
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "redis connect failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        }

        Err(CacheError::Connection(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no connection attempts made".to_string()),
        ))
    }

    pub async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, secs).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
        Ok(keys)
    }

    pub async fn delete_keys(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: usize = conn.del(keys).await?;
        Ok(deleted)
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Drop the connection. The multiplexed connection closes when the last
    /// clone is dropped; this exists so shutdown reads explicitly.
    pub fn close(self) {
        drop(self.conn);
    }
}
