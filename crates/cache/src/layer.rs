//! Failover facade over the Redis primary and the in-memory fallback.
//!
//! A single `primary_available` flag gates the primary branch. Every public
//! operation checks the flag, tries the primary, and on any backend error
//! logs a warning, flips the flag, and answers from the fallback map
//! instead. Callers never see a cache error.
//!
//! The flag recovers through [`CacheLayer::refresh_health`], a PING probe
//! the scan loop runs on its own cadence — the poll-driven equivalent of a
//! client connection-event hook.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use tracing::{info, warn};

use upkeep_core::config::CacheConfig;

use crate::error::CacheError;
use crate::memory::MemoryCache;
use crate::redis_backend::RedisCache;

pub struct CacheLayer {
    primary: RwLock<Option<RedisCache>>,
    fallback: MemoryCache,
    primary_available: AtomicBool,
}

impl CacheLayer {
    /// Connect the primary with bounded retry. Never fails: when Redis is
    /// unreachable the layer starts degraded on the in-memory map.
    pub async fn connect(config: &CacheConfig) -> Self {
        match RedisCache::connect(
            &config.url,
            config.connect_attempts,
            config.connect_retry_delay,
        )
        .await
        {
            Ok(primary) => Self {
                primary: RwLock::new(Some(primary)),
                fallback: MemoryCache::new(),
                primary_available: AtomicBool::new(true),
            },
            Err(e) => {
                warn!(error = %e, "redis unavailable, running on in-memory cache");
                Self::fallback_only()
            }
        }
    }

    /// Layer with no primary at all; used when Redis never connected and by
    /// tests that exercise the degraded path.
    pub fn fallback_only() -> Self {
        Self {
            primary: RwLock::new(None),
            fallback: MemoryCache::new(),
            primary_available: AtomicBool::new(false),
        }
    }

    fn primary(&self) -> Option<RedisCache> {
        if self.primary_available.load(Ordering::Relaxed) {
            self.primary
                .read()
                .expect("primary cache lock poisoned")
                .clone()
        } else {
            None
        }
    }

    fn mark_unavailable(&self, op: &str, e: CacheError) {
        warn!(op, error = %e, "primary cache failed, falling back to memory");
        self.primary_available.store(false, Ordering::Relaxed);
    }

    // ── Contract operations ─────────────────────────────────────────

    pub async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(primary) = self.primary() {
            match primary.set_with_expiry(key, value, ttl).await {
                Ok(()) => return,
                Err(e) => self.mark_unavailable("set_with_expiry", e),
            }
        }
        self.fallback.set_with_expiry(key, value, ttl);
    }

    pub async fn exists(&self, key: &str) -> bool {
        if let Some(primary) = self.primary() {
            match primary.exists(key).await {
                Ok(found) => return found,
                Err(e) => self.mark_unavailable("exists", e),
            }
        }
        self.fallback.exists(key)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(primary) = self.primary() {
            match primary.get(key).await {
                Ok(value) => return value,
                Err(e) => self.mark_unavailable("get", e),
            }
        }
        self.fallback.get(key)
    }

    pub async fn scan_by_prefix(&self, prefix: &str) -> Vec<String> {
        if let Some(primary) = self.primary() {
            match primary.scan_by_prefix(prefix).await {
                Ok(keys) => return keys,
                Err(e) => self.mark_unavailable("scan_by_prefix", e),
            }
        }
        self.fallback.scan_by_prefix(prefix)
    }

    pub async fn delete_keys(&self, keys: &[String]) -> usize {
        if let Some(primary) = self.primary() {
            match primary.delete_keys(keys).await {
                Ok(deleted) => return deleted,
                Err(e) => self.mark_unavailable("delete_keys", e),
            }
        }
        self.fallback.delete_keys(keys)
    }

    /// Bulk cleanup for a key namespace. On the primary this is a blunt
    /// wipe of every key under `prefix`; on the fallback it drops expired
    /// entries so the map stays bounded during long degraded runs.
    pub async fn purge_prefix(&self, prefix: &str) -> usize {
        if let Some(primary) = self.primary() {
            let wiped = async {
                let keys = primary.scan_by_prefix(prefix).await?;
                primary.delete_keys(&keys).await
            }
            .await;
            match wiped {
                Ok(deleted) => return deleted,
                Err(e) => self.mark_unavailable("purge_prefix", e),
            }
        }
        self.fallback.purge_expired(prefix)
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Whether the primary backend is currently serving operations.
    pub fn is_connected(&self) -> bool {
        self.primary_available.load(Ordering::Relaxed)
    }

    /// Probe the primary and update the health flag. The multiplexed
    /// connection reconnects on its own; this notices when it has.
    pub async fn refresh_health(&self) -> bool {
        let primary = self
            .primary
            .read()
            .expect("primary cache lock poisoned")
            .clone();
        let Some(primary) = primary else {
            return false;
        };
        match primary.ping().await {
            Ok(()) => {
                if !self.primary_available.swap(true, Ordering::Relaxed) {
                    info!("primary cache reachable again");
                }
                true
            }
            Err(_) => {
                self.primary_available.store(false, Ordering::Relaxed);
                false
            }
        }
    }

    /// Release the primary connection on shutdown.
    pub fn close(&self) {
        let taken = self
            .primary
            .write()
            .expect("primary cache lock poisoned")
            .take();
        if let Some(primary) = taken {
            primary.close();
            info!("redis connection closed");
        }
        self.primary_available.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // All tests run against `fallback_only()`: the primary simulated as
    // unavailable from process start, per the degraded-mode contract.

    #[tokio::test]
    async fn all_operations_work_without_primary() {
        let layer = CacheLayer::fallback_only();

        layer
            .set_with_expiry("alert:1", "{\"a\":1}", Duration::from_secs(60))
            .await;
        assert!(layer.exists("alert:1").await);
        assert_eq!(layer.get("alert:1").await, Some("{\"a\":1}".to_string()));
        assert_eq!(layer.scan_by_prefix("alert:").await, vec!["alert:1"]);
        assert_eq!(layer.delete_keys(&["alert:1".to_string()]).await, 1);
        assert!(!layer.exists("alert:1").await);
    }

    #[tokio::test]
    async fn health_flag_reports_false_throughout_degraded_run() {
        let layer = CacheLayer::fallback_only();
        assert!(!layer.is_connected());

        layer.set_with_expiry("k", "v", Duration::from_secs(60)).await;
        let _ = layer.exists("k").await;
        assert!(!layer.is_connected());
        assert!(!layer.refresh_health().await);
    }

    #[tokio::test]
    async fn purge_prefix_drops_expired_fallback_entries() {
        let layer = CacheLayer::fallback_only();
        layer.set_with_expiry("alert:dead", "x", Duration::from_secs(0)).await;
        layer.set_with_expiry("alert:live", "y", Duration::from_secs(60)).await;

        assert_eq!(layer.purge_prefix("alert:").await, 1);
        assert!(layer.exists("alert:live").await);
    }

    #[tokio::test]
    async fn expired_entry_is_absent_before_purge() {
        let layer = CacheLayer::fallback_only();
        layer.set_with_expiry("alert:ttl", "x", Duration::from_secs(0)).await;
        assert!(!layer.exists("alert:ttl").await);
        assert_eq!(layer.get("alert:ttl").await, None);
    }
}
