//! Shared per-process state handed to every request handler.

use std::sync::Arc;

use upkeep_cache::{AlertCache, CacheLayer, StatsRecorder};
use upkeep_core::{Config, MaintenanceStore};

use crate::hub::BroadcastHub;
use crate::scheduler::{AlertScheduler, ScanDeps};

pub struct AppState {
    pub config: Config,
    pub cache: Arc<CacheLayer>,
    pub scheduler: AlertScheduler,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(
        config: Config,
        cache: Arc<CacheLayer>,
        store: Arc<dyn MaintenanceStore>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        let deps = ScanDeps {
            store,
            alerts: AlertCache::new(cache.clone(), config.cache.alert_ttl),
            stats: StatsRecorder::new(cache.clone()),
            cache: cache.clone(),
            window_days: config.scheduler.alert_window_days,
        };
        let scheduler = AlertScheduler::new(deps, config.scheduler.clone());
        Self {
            config,
            cache,
            scheduler,
            hub,
        }
    }
}
