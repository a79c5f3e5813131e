//! Last-scan telemetry, stored through the cache layer at a fixed key.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use upkeep_core::ScanStats;

use crate::layer::CacheLayer;

const STATS_KEY: &str = "last_check_stats";
const STATS_TTL: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Clone)]
pub struct StatsRecorder {
    layer: Arc<CacheLayer>,
}

impl StatsRecorder {
    pub fn new(layer: Arc<CacheLayer>) -> Self {
        Self { layer }
    }

    /// Overwrite the most-recent-run record. Failure-silent.
    pub async fn set(&self, stats: &ScanStats) {
        let json = match serde_json::to_string(stats) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize scan stats");
                return;
            }
        };
        self.layer.set_with_expiry(STATS_KEY, &json, STATS_TTL).await;
    }

    /// Most recent scan stats, if a scan ran within the TTL window.
    pub async fn get(&self) -> Option<ScanStats> {
        let json = self.layer.get(STATS_KEY).await?;
        match serde_json::from_str(&json) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "undecodable scan stats in cache");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_latest() {
        let recorder = StatsRecorder::new(Arc::new(CacheLayer::fallback_only()));
        assert!(recorder.get().await.is_none());

        recorder.set(&ScanStats::new(10, 2)).await;
        let first = recorder.get().await.unwrap();
        assert_eq!(first.total_checked, 10);
        assert_eq!(first.alerts_found, 2);

        recorder.set(&ScanStats::new(11, 0)).await;
        let second = recorder.get().await.unwrap();
        assert_eq!(second.total_checked, 11);
        assert_eq!(second.alerts_found, 0);
    }
}
