//! In-process fallback cache.
//!
//! Entries expire lazily: a read of an expired key reports absence but the
//! entry stays in the map until a prefix scan, bulk delete, or
//! [`MemoryCache::purge_expired`] removes it. The daily purge job exists to
//! keep this map bounded when the process runs degraded for a long time.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

struct MemoryEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Concurrent map of `key -> (serialized value, expiry)`.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        let mut entries = self.entries.write().expect("memory cache lock poisoned");
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub fn exists(&self, key: &str) -> bool {
        let entries = self.entries.read().expect("memory cache lock poisoned");
        entries
            .get(key)
            .map(|e| e.expires_at > Utc::now())
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().expect("memory cache lock poisoned");
        entries
            .get(key)
            .filter(|e| e.expires_at > Utc::now())
            .map(|e| e.value.clone())
    }

    /// Keys under `prefix` whose entries are still live.
    pub fn scan_by_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Utc::now();
        let entries = self.entries.read().expect("memory cache lock poisoned");
        entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Remove the given keys, returning how many were actually present.
    pub fn delete_keys(&self, keys: &[String]) -> usize {
        let mut entries = self.entries.write().expect("memory cache lock poisoned");
        keys.iter().filter(|k| entries.remove(*k).is_some()).count()
    }

    /// Drop expired entries under `prefix`, returning the count removed.
    pub fn purge_expired(&self, prefix: &str) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().expect("memory cache lock poisoned");
        let before = entries.len();
        entries.retain(|k, e| !(k.starts_with(prefix) && e.expires_at <= now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("memory cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
