//! Route table and middleware stack.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::{api, live};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/ws", get(live::ws_upgrade))
        .route("/cron/start", post(api::cron_start))
        .route("/cron/stop", post(api::cron_stop))
        .route("/cron/status", get(api::cron_status))
        .route("/cron/run", post(api::cron_run))
        .route("/cron/alerts", get(api::cron_alerts))
        .route("/cron/stats", get(api::cron_stats))
        .route("/cron/purge", post(api::cron_purge))
        .route("/cron/system-info", get(api::system_info))
        .route("/dashboard/alerts", get(api::dashboard_alerts))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use upkeep_cache::CacheLayer;
    use upkeep_core::config::{CacheConfig, Config, SchedulerConfig, ServerConfig};
    use upkeep_core::{InMemoryMaintenanceStore, MaintenanceRecord};

    use crate::hub::BroadcastHub;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            cache: CacheConfig {
                url: "redis://localhost:6379".to_string(),
                connect_attempts: 1,
                connect_retry_delay: Duration::from_millis(1),
                alert_ttl: Duration::from_secs(3600),
            },
            scheduler: SchedulerConfig {
                scan_interval: Duration::from_secs(3600),
                purge_interval: Duration::from_secs(3600),
                purge_hour: None,
                alert_window_days: 7,
                autostart: false,
            },
        }
    }

    fn record(id: &str, days_ahead: i64) -> MaintenanceRecord {
        MaintenanceRecord {
            id: id.to_string(),
            machine_id: "mach-1".to_string(),
            machine_model: "HX-900".to_string(),
            machine_serial: "SN-1".to_string(),
            client: "Acme".to_string(),
            location: "Plant 1".to_string(),
            due_date: Utc::now() + ChronoDuration::days(days_ahead),
            maintenance_type: "preventive".to_string(),
            technician_id: "tech-1".to_string(),
            spare_parts: vec![],
            observations: None,
            is_completed: false,
        }
    }

    async fn app_with(store: Arc<InMemoryMaintenanceStore>) -> Router {
        let cache = Arc::new(CacheLayer::fallback_only());
        let state = Arc::new(AppState::new(
            test_config(),
            cache,
            store,
            Arc::new(BroadcastHub::new()),
        ));
        router(state)
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok_and_cache_state() {
        let app = app_with(Arc::new(InMemoryMaintenanceStore::new())).await;
        let (status, body) = send(app, Method::GET, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["payload"]["status"], "ok");
        assert_eq!(body["payload"]["cacheConnected"], false);
    }

    #[tokio::test]
    async fn status_shows_idle_jobs_before_start() {
        let app = app_with(Arc::new(InMemoryMaintenanceStore::new())).await;
        let (status, body) = send(app, Method::GET, "/cron/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["scanActive"], false);
        assert_eq!(body["payload"]["purgeActive"], false);
    }

    #[tokio::test]
    async fn manual_run_reports_scan_outcome() {
        let store = Arc::new(InMemoryMaintenanceStore::new());
        store.insert(record("m1", 2)).await;
        let app = app_with(store).await;

        let (status, body) = send(app.clone(), Method::POST, "/cron/run").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["totalChecked"], 1);
        assert_eq!(body["payload"]["alertsFound"], 1);

        // The alert is now cached; a second run finds nothing new.
        let (_, rerun) = send(app.clone(), Method::POST, "/cron/run").await;
        assert_eq!(rerun["payload"]["alertsFound"], 0);

        let (_, alerts) = send(app, Method::GET, "/cron/alerts").await;
        assert_eq!(alerts["payload"]["count"], 1);
    }

    #[tokio::test]
    async fn stats_populated_after_a_scan() {
        let app = app_with(Arc::new(InMemoryMaintenanceStore::new())).await;

        let (_, before) = send(app.clone(), Method::GET, "/cron/stats").await;
        assert!(before["payload"]["stats"].is_null());

        let _ = send(app.clone(), Method::POST, "/cron/run").await;
        let (_, after) = send(app, Method::GET, "/cron/stats").await;
        assert_eq!(after["payload"]["stats"]["totalChecked"], 0);
    }

    #[tokio::test]
    async fn dashboard_maps_overdue_to_critical() {
        let store = Arc::new(InMemoryMaintenanceStore::new());
        store.insert(record("ancient", -400)).await;
        store.insert(record("late", -2)).await;
        store.insert(record("soon", 2)).await;
        store.insert(record("next-month", 20)).await;
        let app = app_with(store).await;

        let (status, body) = send(app, Method::GET, "/dashboard/alerts").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["payload"].as_array().unwrap();
        assert_eq!(rows.len(), 4);
        // Overdue work has no lower cutoff, however stale.
        assert_eq!(rows[0]["id"], "ancient");
        assert_eq!(rows[0]["priority"], "critical");
        assert_eq!(rows[1]["id"], "late");
        assert_eq!(rows[1]["priority"], "critical");
        assert_eq!(rows[2]["priority"], "high");
        assert_eq!(rows[3]["priority"], "low");
    }

    #[tokio::test]
    async fn start_then_stop_round_trip() {
        let app = app_with(Arc::new(InMemoryMaintenanceStore::new())).await;

        let (_, started) = send(app.clone(), Method::POST, "/cron/start").await;
        assert_eq!(started["payload"]["changed"], true);
        assert_eq!(started["payload"]["status"]["scanActive"], true);

        let (_, again) = send(app.clone(), Method::POST, "/cron/start").await;
        assert_eq!(again["payload"]["changed"], false);

        let (_, stopped) = send(app, Method::POST, "/cron/stop").await;
        assert_eq!(stopped["payload"]["changed"], true);
        assert_eq!(stopped["payload"]["status"]["scanActive"], false);
    }

    #[tokio::test]
    async fn system_info_aggregates_the_parts() {
        let app = app_with(Arc::new(InMemoryMaintenanceStore::new())).await;
        let (status, body) = send(app, Method::GET, "/cron/system-info").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["jobStatus"]["scanActive"], false);
        assert_eq!(body["payload"]["cachedAlertsCount"], 0);
        assert_eq!(body["payload"]["websocketConnections"], 0);
        assert_eq!(body["payload"]["alertWindowDays"], 7);
        assert!(body["payload"]["systemTime"].is_string());
    }
}
