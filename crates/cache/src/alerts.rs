//! Alert cache: the dedup store for reported maintenance alerts.
//!
//! Keys live under the `maintenance_alert:` namespace. An alert id present
//! in the cache means "already reported within the TTL window"; the scan
//! skips it. All methods inherit the layer's failure-silent semantics.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use upkeep_core::MaintenanceAlert;

use crate::layer::CacheLayer;

const ALERT_KEY_PREFIX: &str = "maintenance_alert:";

#[derive(Clone)]
pub struct AlertCache {
    layer: Arc<CacheLayer>,
    ttl: Duration,
}

impl AlertCache {
    pub fn new(layer: Arc<CacheLayer>, ttl: Duration) -> Self {
        Self { layer, ttl }
    }

    fn key(alert_id: &str) -> String {
        format!("{}{}", ALERT_KEY_PREFIX, alert_id)
    }

    /// Store an alert for the TTL window, suppressing re-broadcast.
    pub async fn cache_alert(&self, alert: &MaintenanceAlert) {
        let json = match serde_json::to_string(alert) {
            Ok(json) => json,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "failed to serialize alert, not cached");
                return;
            }
        };
        self.layer
            .set_with_expiry(&Self::key(&alert.id), &json, self.ttl)
            .await;
        debug!(alert_id = %alert.id, "alert cached");
    }

    /// Whether this alert id was already reported within the TTL window.
    pub async fn is_reported(&self, alert_id: &str) -> bool {
        self.layer.exists(&Self::key(alert_id)).await
    }

    /// All currently cached alerts. Entries that fail to deserialize are
    /// skipped with a warning rather than failing the whole listing.
    pub async fn cached_alerts(&self) -> Vec<MaintenanceAlert> {
        let keys = self.layer.scan_by_prefix(ALERT_KEY_PREFIX).await;
        let mut alerts = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(json) = self.layer.get(&key).await else {
                continue;
            };
            match serde_json::from_str::<MaintenanceAlert>(&json) {
                Ok(alert) => alerts.push(alert),
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable cached alert"),
            }
        }
        alerts
    }

    /// Bulk cleanup of the alert namespace; returns the count removed.
    pub async fn purge(&self) -> usize {
        self.layer.purge_prefix(ALERT_KEY_PREFIX).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use upkeep_core::alert::{alert_id, scan_priority};

    fn make_alert(maintenance_id: &str) -> MaintenanceAlert {
        let due = Utc::now() + chrono::Duration::days(3);
        MaintenanceAlert {
            id: alert_id(maintenance_id, due),
            maintenance_id: maintenance_id.to_string(),
            machine_id: "mach-1".to_string(),
            machine_model: "HX-900".to_string(),
            machine_serial: "SN-1".to_string(),
            client: "Acme".to_string(),
            due_date: due,
            days_remaining: 3,
            maintenance_type: "preventive".to_string(),
            priority: scan_priority(3),
            location: "Plant 1".to_string(),
            technician_id: "tech-1".to_string(),
            spare_parts: vec![],
            observations: None,
        }
    }

    fn fallback_cache() -> AlertCache {
        AlertCache::new(
            Arc::new(CacheLayer::fallback_only()),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn cache_then_is_reported() {
        let cache = fallback_cache();
        let alert = make_alert("m1");

        assert!(!cache.is_reported(&alert.id).await);
        cache.cache_alert(&alert).await;
        assert!(cache.is_reported(&alert.id).await);
    }

    #[tokio::test]
    async fn cached_alert_round_trips_identically() {
        let cache = fallback_cache();
        let alert = make_alert("m1");
        cache.cache_alert(&alert).await;

        let listed = cache.cached_alerts().await;
        assert_eq!(listed, vec![alert]);
    }

    #[tokio::test]
    async fn expired_alert_reads_as_unreported() {
        let cache = AlertCache::new(
            Arc::new(CacheLayer::fallback_only()),
            Duration::from_secs(0),
        );
        let alert = make_alert("m1");
        cache.cache_alert(&alert).await;

        assert!(!cache.is_reported(&alert.id).await);
        assert!(cache.cached_alerts().await.is_empty());
    }

    #[tokio::test]
    async fn purge_clears_expired_entries() {
        let layer = Arc::new(CacheLayer::fallback_only());
        let expired = AlertCache::new(layer.clone(), Duration::from_secs(0));
        let live = AlertCache::new(layer, Duration::from_secs(60));

        expired.cache_alert(&make_alert("old")).await;
        live.cache_alert(&make_alert("new")).await;

        assert_eq!(expired.purge().await, 1);
        assert_eq!(live.cached_alerts().await.len(), 1);
    }
}
