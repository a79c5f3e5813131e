use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            cache: CacheConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            host = %self.server.host,
            port = self.server.port,
            redis = %self.cache.url,
            scan_interval_secs = self.scheduler.scan_interval.as_secs(),
            purge_hour_utc = ?self.scheduler.purge_hour,
            alert_ttl_secs = self.cache.alert_ttl.as_secs(),
            autostart = self.scheduler.autostart,
            "configuration loaded"
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 3000),
        }
    }
}

// ── Cache ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL; e.g. `redis://localhost:6379`.
    pub url: String,
    /// Connection attempts before giving up and running on the fallback map.
    pub connect_attempts: u32,
    /// Delay between connection attempts.
    pub connect_retry_delay: Duration,
    /// How long a cached alert suppresses re-broadcast of the same event.
    pub alert_ttl: Duration,
}

impl CacheConfig {
    fn from_env() -> Self {
        let url = env_opt("REDIS_URL").unwrap_or_else(|| {
            let host = env_or("REDIS_HOST", "localhost");
            let port = env_u16("REDIS_PORT", 6379);
            match env_opt("REDIS_PASSWORD") {
                Some(pw) => format!("redis://:{}@{}:{}", pw, host, port),
                None => format!("redis://{}:{}", host, port),
            }
        });
        Self {
            url,
            connect_attempts: env_u64("REDIS_CONNECT_ATTEMPTS", 3) as u32,
            connect_retry_delay: Duration::from_millis(env_u64("REDIS_CONNECT_RETRY_MS", 500)),
            alert_ttl: Duration::from_secs(env_u64("ALERT_TTL_SECS", 60 * 60 * 24)),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Period of the alert scan job.
    pub scan_interval: Duration,
    /// Period of the cache purge job.
    pub purge_interval: Duration,
    /// Optional fixed UTC hour the purge job aligns its first run to.
    pub purge_hour: Option<u32>,
    /// Days ahead a pending maintenance is considered for alerting.
    pub alert_window_days: i64,
    /// Start both jobs at boot without an explicit POST /cron/start.
    pub autostart: bool,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        Self {
            scan_interval: Duration::from_secs(env_u64("SCAN_INTERVAL_SECS", 600)),
            purge_interval: Duration::from_secs(env_u64("PURGE_INTERVAL_SECS", 86_400)),
            purge_hour: env_opt("PURGE_HOUR_UTC").and_then(|v| v.parse().ok()),
            alert_window_days: env_u64("ALERT_WINDOW_DAYS", 7) as i64,
            autostart: env_bool("SCHEDULER_AUTOSTART", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // Scope to keys this test relies on; CI sets none of them.
        assert_eq!(env_u16("UPKEEP_TEST_UNSET_PORT", 3000), 3000);
        assert_eq!(env_u64("UPKEEP_TEST_UNSET_SECS", 600), 600);
        assert!(env_bool("UPKEEP_TEST_UNSET_FLAG", true));
        assert!(!env_bool("UPKEEP_TEST_UNSET_FLAG2", false));
    }

    #[test]
    fn env_bool_parses_common_truthy_values() {
        std::env::set_var("UPKEEP_TEST_BOOL", "yes");
        assert!(env_bool("UPKEEP_TEST_BOOL", false));
        std::env::set_var("UPKEEP_TEST_BOOL", "0");
        assert!(!env_bool("UPKEEP_TEST_BOOL", true));
        std::env::remove_var("UPKEEP_TEST_BOOL");
    }
}
