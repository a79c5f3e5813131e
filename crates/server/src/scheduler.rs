//! Background jobs: the periodic alert scan and the daily cache purge.
//!
//! Each job is a spawned loop gated by a `watch` stop signal. The signal is
//! only checked between ticks, so a run already in flight always completes;
//! stop means "no further runs", not abort. Job presence doubles as the
//! running flag: a held `watch::Sender` means the job is live.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use upkeep_cache::{AlertCache, CacheLayer, StatsRecorder};
use upkeep_core::config::SchedulerConfig;
use upkeep_core::{evaluate, MaintenanceStore, ScanStats};

use crate::hub;

// ── Scan ────────────────────────────────────────────────────────────

/// Everything one scan run needs, shared between the loop and manual runs.
pub struct ScanDeps {
    pub store: Arc<dyn MaintenanceStore>,
    pub alerts: AlertCache,
    pub stats: StatsRecorder,
    pub cache: Arc<CacheLayer>,
    pub window_days: i64,
}

/// Result of one completed scan run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub total_checked: usize,
    pub alerts_found: usize,
    pub execution_ms: u64,
}

/// One full scan: query the due window, evaluate, dedup against the cache,
/// record stats, broadcast anything new. A store failure is the only error;
/// everything downstream of the query is failure-silent.
pub async fn run_scan(deps: &ScanDeps) -> anyhow::Result<ScanOutcome> {
    let started = Instant::now();

    // The multiplexed connection may have recovered since the last run.
    deps.cache.refresh_health().await;

    let now = Utc::now();
    let records = deps
        .store
        .find_pending_due_within(now, now + ChronoDuration::days(deps.window_days))
        .await?;

    let mut new_alerts = Vec::new();
    for record in &records {
        let Some(alert) = evaluate(record, now) else {
            continue;
        };
        if deps.alerts.is_reported(&alert.id).await {
            continue;
        }
        deps.alerts.cache_alert(&alert).await;
        new_alerts.push(alert);
    }

    let stats = ScanStats::new(records.len(), new_alerts.len());
    deps.stats.set(&stats).await;

    if !new_alerts.is_empty() {
        hub::broadcast_maintenance_alerts(&new_alerts);
    }

    let outcome = ScanOutcome {
        total_checked: records.len(),
        alerts_found: new_alerts.len(),
        execution_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        total_checked = outcome.total_checked,
        alerts_found = outcome.alerts_found,
        execution_ms = outcome.execution_ms,
        "maintenance scan completed"
    );
    Ok(outcome)
}

// ── Scheduler ───────────────────────────────────────────────────────

/// Reported through `GET /cron/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub scan_active: bool,
    pub purge_active: bool,
    pub cache_connected: bool,
}

pub struct AlertScheduler {
    deps: Arc<ScanDeps>,
    config: SchedulerConfig,
    scan_stop: Mutex<Option<watch::Sender<bool>>>,
    purge_stop: Mutex<Option<watch::Sender<bool>>>,
}

impl AlertScheduler {
    pub fn new(deps: ScanDeps, config: SchedulerConfig) -> Self {
        Self {
            deps: Arc::new(deps),
            config,
            scan_stop: Mutex::new(None),
            purge_stop: Mutex::new(None),
        }
    }

    /// Start both jobs. Returns false without side effects when they are
    /// already running.
    pub fn start(&self) -> bool {
        let mut scan_slot = self.scan_stop.lock().expect("scheduler lock poisoned");
        let mut purge_slot = self.purge_stop.lock().expect("scheduler lock poisoned");
        if scan_slot.is_some() || purge_slot.is_some() {
            return false;
        }

        let (scan_tx, scan_rx) = watch::channel(false);
        let (purge_tx, purge_rx) = watch::channel(false);
        *scan_slot = Some(scan_tx);
        *purge_slot = Some(purge_tx);

        tokio::spawn(scan_loop(
            self.deps.clone(),
            self.config.scan_interval,
            scan_rx,
        ));
        tokio::spawn(purge_loop(
            self.deps.clone(),
            self.config.purge_interval,
            self.config.purge_hour,
            purge_rx,
        ));

        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            purge_interval_secs = self.config.purge_interval.as_secs(),
            purge_hour_utc = ?self.config.purge_hour,
            "scheduler started"
        );
        true
    }

    /// Signal both jobs to stop after their current run, if any is in
    /// flight. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let scan = self
            .scan_stop
            .lock()
            .expect("scheduler lock poisoned")
            .take();
        let purge = self
            .purge_stop
            .lock()
            .expect("scheduler lock poisoned")
            .take();

        let was_running = scan.is_some() || purge.is_some();
        if let Some(tx) = scan {
            let _ = tx.send(true);
        }
        if let Some(tx) = purge {
            let _ = tx.send(true);
        }
        if was_running {
            info!("scheduler stopped");
        }
        was_running
    }

    /// Run one scan now, independent of the periodic job. Races with a
    /// concurrent periodic run resolve through the dedup cache.
    pub async fn run_manual(&self) -> anyhow::Result<ScanOutcome> {
        info!("manual maintenance scan requested");
        run_scan(&self.deps).await
    }

    /// Purge the alert namespace now; returns the entry count removed.
    pub async fn run_purge(&self) -> usize {
        let deleted = self.deps.alerts.purge().await;
        info!(deleted, "alert cache purged");
        deleted
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            scan_active: self
                .scan_stop
                .lock()
                .expect("scheduler lock poisoned")
                .is_some(),
            purge_active: self
                .purge_stop
                .lock()
                .expect("scheduler lock poisoned")
                .is_some(),
            cache_connected: self.deps.cache.is_connected(),
        }
    }

    pub fn deps(&self) -> &ScanDeps {
        &self.deps
    }
}

// ── Job loops ───────────────────────────────────────────────────────

async fn scan_loop(
    deps: Arc<ScanDeps>,
    period: std::time::Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        if let Err(e) = run_scan(&deps).await {
            error!(error = %e, "maintenance scan failed");
        }
    }
    info!("scan job exited");
}

async fn purge_loop(
    deps: Arc<ScanDeps>,
    period: std::time::Duration,
    fixed_hour: Option<u32>,
    mut stop: watch::Receiver<bool>,
) {
    // Align the first run to the configured UTC hour, then fall into the
    // plain periodic cadence.
    if let Some(hour) = fixed_hour {
        let delay = delay_until_utc_hour(hour);
        tokio::select! {
            _ = stop.changed() => {
                info!("purge job exited");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        let deleted = deps.alerts.purge().await;
        info!(deleted, "scheduled alert cache purge completed");
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; purge waits a full period instead.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        let deleted = deps.alerts.purge().await;
        info!(deleted, "scheduled alert cache purge completed");
    }
    info!("purge job exited");
}

/// Duration until the next `hour:00:00` UTC, strictly in the future.
fn delay_until_utc_hour(hour: u32) -> std::time::Duration {
    let hour = hour.min(23);
    let now = Utc::now();
    let today = now.date_naive().and_hms_opt(hour, 0, 0).and_then(|dt| {
        Utc.from_local_datetime(&dt).single()
    });
    let target = match today {
        Some(t) if t > now => t,
        Some(t) => t + ChronoDuration::days(1),
        None => now + ChronoDuration::days(1),
    };
    (target - now)
        .to_std()
        .unwrap_or_else(|_| std::time::Duration::from_secs(0))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::time::Duration;
    use upkeep_core::{InMemoryMaintenanceStore, MaintenanceRecord};

    fn record(id: &str, due: DateTime<Utc>) -> MaintenanceRecord {
        MaintenanceRecord {
            id: id.to_string(),
            machine_id: "mach-1".to_string(),
            machine_model: "HX-900".to_string(),
            machine_serial: "SN-1".to_string(),
            client: "Acme".to_string(),
            location: "Plant 1".to_string(),
            due_date: due,
            maintenance_type: "preventive".to_string(),
            technician_id: "tech-1".to_string(),
            spare_parts: vec![],
            observations: None,
            is_completed: false,
        }
    }

    fn deps_with_store(store: Arc<dyn MaintenanceStore>) -> ScanDeps {
        let cache = Arc::new(CacheLayer::fallback_only());
        ScanDeps {
            store,
            alerts: AlertCache::new(cache.clone(), Duration::from_secs(3600)),
            stats: StatsRecorder::new(cache.clone()),
            cache,
            window_days: 7,
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            scan_interval: Duration::from_secs(3600),
            purge_interval: Duration::from_secs(3600),
            purge_hour: None,
            alert_window_days: 7,
            autostart: false,
        }
    }

    #[tokio::test]
    async fn scan_finds_alerts_then_dedups_on_rerun() {
        let store = Arc::new(InMemoryMaintenanceStore::new());
        let now = Utc::now();
        store.insert(record("m1", now + ChronoDuration::days(2))).await;
        store.insert(record("m2", now + ChronoDuration::days(5))).await;
        let deps = deps_with_store(store);

        let first = run_scan(&deps).await.unwrap();
        assert_eq!(first.total_checked, 2);
        assert_eq!(first.alerts_found, 2);

        let second = run_scan(&deps).await.unwrap();
        assert_eq!(second.total_checked, 2);
        assert_eq!(second.alerts_found, 0);
    }

    #[tokio::test]
    async fn scan_ignores_records_outside_window() {
        let store = Arc::new(InMemoryMaintenanceStore::new());
        let now = Utc::now();
        store.insert(record("far", now + ChronoDuration::days(30))).await;
        let deps = deps_with_store(store);

        let outcome = run_scan(&deps).await.unwrap();
        assert_eq!(outcome.total_checked, 0);
        assert_eq!(outcome.alerts_found, 0);
    }

    #[tokio::test]
    async fn scan_records_stats_even_when_nothing_found() {
        let deps = deps_with_store(Arc::new(InMemoryMaintenanceStore::new()));
        assert!(deps.stats.get().await.is_none());

        run_scan(&deps).await.unwrap();
        let stats = deps.stats.get().await.unwrap();
        assert_eq!(stats.total_checked, 0);
        assert_eq!(stats.alerts_found, 0);
    }

    struct FailingStore;

    #[async_trait]
    impl MaintenanceStore for FailingStore {
        async fn find_pending_due_within(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> anyhow::Result<Vec<MaintenanceRecord>> {
            anyhow::bail!("store offline")
        }
    }

    #[tokio::test]
    async fn store_failure_propagates_and_leaves_no_stats() {
        let deps = deps_with_store(Arc::new(FailingStore));
        assert!(run_scan(&deps).await.is_err());
        assert!(deps.stats.get().await.is_none());
    }

    #[tokio::test]
    async fn start_stop_flip_status_flags() {
        let scheduler = AlertScheduler::new(
            deps_with_store(Arc::new(InMemoryMaintenanceStore::new())),
            config(),
        );
        assert!(!scheduler.status().scan_active);

        assert!(scheduler.start());
        let status = scheduler.status();
        assert!(status.scan_active);
        assert!(status.purge_active);
        assert!(!status.cache_connected);

        assert!(!scheduler.start()); // already running

        assert!(scheduler.stop());
        assert!(!scheduler.status().scan_active);
        assert!(!scheduler.stop()); // already stopped
    }

    #[tokio::test]
    async fn manual_run_works_while_jobs_are_stopped() {
        let store = Arc::new(InMemoryMaintenanceStore::new());
        store
            .insert(record("m1", Utc::now() + ChronoDuration::days(1)))
            .await;
        let scheduler = AlertScheduler::new(deps_with_store(store), config());

        let outcome = scheduler.run_manual().await.unwrap();
        assert_eq!(outcome.alerts_found, 1);
    }

    #[test]
    fn delay_until_hour_is_under_a_day() {
        let delay = delay_until_utc_hour(2);
        assert!(delay <= Duration::from_secs(86_400));
    }
}
