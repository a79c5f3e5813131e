//! Admin and dashboard HTTP handlers.
//!
//! Every endpoint answers the same envelope: `{success, payload}` on the
//! happy path, `{success: false, error}` with a 500 when the one fallible
//! collaborator (the maintenance store) fails.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::error;

use upkeep_core::alert::{days_remaining, listing_priority};
use upkeep_core::{MaintenanceAlert, Priority, ScanStats};

use crate::scheduler::{JobStatus, ScanOutcome};
use crate::state::AppState;

/// How far ahead the dashboard listing looks.
const DASHBOARD_WINDOW_DAYS: i64 = 30;
/// Cap on the dashboard listing length.
const DASHBOARD_LIMIT: usize = 10;

// ── Response envelope ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(payload: T) -> Json<Self> {
        Json(Self {
            success: true,
            payload: Some(payload),
            error: None,
        })
    }

    pub fn err(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            payload: None,
            error: Some(message.into()),
        })
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

fn internal<T: Serialize>(message: String) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::err(message))
}

// ── Scheduler control ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPayload {
    pub changed: bool,
    pub status: JobStatus,
}

pub async fn cron_start(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ControlPayload>> {
    let changed = state.scheduler.start();
    ApiResponse::ok(ControlPayload {
        changed,
        status: state.scheduler.status(),
    })
}

pub async fn cron_stop(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ControlPayload>> {
    let changed = state.scheduler.stop();
    ApiResponse::ok(ControlPayload {
        changed,
        status: state.scheduler.status(),
    })
}

pub async fn cron_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<JobStatus>> {
    ApiResponse::ok(state.scheduler.status())
}

pub async fn cron_run(State(state): State<Arc<AppState>>) -> ApiResult<ScanOutcome> {
    match state.scheduler.run_manual().await {
        Ok(outcome) => Ok(ApiResponse::ok(outcome)),
        Err(e) => {
            error!(error = %e, "manual scan failed");
            Err(internal(e.to_string()))
        }
    }
}

// ── Cache inspection ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AlertsPayload {
    pub alerts: Vec<MaintenanceAlert>,
    pub count: usize,
}

pub async fn cron_alerts(State(state): State<Arc<AppState>>) -> Json<ApiResponse<AlertsPayload>> {
    let alerts = state.scheduler.deps().alerts.cached_alerts().await;
    let count = alerts.len();
    ApiResponse::ok(AlertsPayload { alerts, count })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    pub stats: Option<ScanStats>,
    pub cache_connected: bool,
}

pub async fn cron_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsPayload>> {
    ApiResponse::ok(StatsPayload {
        stats: state.scheduler.deps().stats.get().await,
        cache_connected: state.cache.is_connected(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgePayload {
    pub deleted: usize,
}

pub async fn cron_purge(State(state): State<Arc<AppState>>) -> Json<ApiResponse<PurgePayload>> {
    let deleted = state.scheduler.run_purge().await;
    ApiResponse::ok(PurgePayload { deleted })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfoPayload {
    pub job_status: JobStatus,
    pub last_stats: Option<ScanStats>,
    pub cached_alerts_count: usize,
    pub cache_connected: bool,
    pub websocket_connections: usize,
    pub scan_interval_secs: u64,
    pub alert_window_days: i64,
    pub system_time: DateTime<Utc>,
}

pub async fn system_info(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SystemInfoPayload>> {
    let deps = state.scheduler.deps();
    ApiResponse::ok(SystemInfoPayload {
        job_status: state.scheduler.status(),
        last_stats: deps.stats.get().await,
        cached_alerts_count: deps.alerts.cached_alerts().await.len(),
        cache_connected: state.cache.is_connected(),
        websocket_connections: state.hub.connection_count(),
        scan_interval_secs: state.config.scheduler.scan_interval.as_secs(),
        alert_window_days: state.config.scheduler.alert_window_days,
        system_time: Utc::now(),
    })
}

// ── Dashboard listing ───────────────────────────────────────────────

/// Dashboard row: a live view over the store, not the alert cache, so
/// overdue maintenances show up with their own priority mapping.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingMaintenance {
    pub id: String,
    pub machine_id: String,
    pub machine_model: String,
    pub machine_serial: String,
    pub client: String,
    pub location: String,
    pub due_date: DateTime<Utc>,
    pub days_remaining: i64,
    pub maintenance_type: String,
    pub priority: Priority,
}

pub async fn dashboard_alerts(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<UpcomingMaintenance>> {
    let now = Utc::now();
    // No lower bound: every overdue maintenance surfaces as critical, no
    // matter how stale.
    let records = state
        .scheduler
        .deps()
        .store
        .find_pending_due_within(
            DateTime::<Utc>::MIN_UTC,
            now + ChronoDuration::days(DASHBOARD_WINDOW_DAYS),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "dashboard listing failed");
            internal(e.to_string())
        })?;

    let rows = records
        .into_iter()
        .take(DASHBOARD_LIMIT)
        .map(|record| {
            let days = days_remaining(record.due_date, now);
            UpcomingMaintenance {
                id: record.id,
                machine_id: record.machine_id,
                machine_model: record.machine_model,
                machine_serial: record.machine_serial,
                client: record.client,
                location: record.location,
                due_date: record.due_date,
                days_remaining: days,
                maintenance_type: record.maintenance_type,
                priority: listing_priority(days),
            }
        })
        .collect();
    Ok(ApiResponse::ok(rows))
}

// ── Health ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPayload {
    pub status: &'static str,
    pub cache_connected: bool,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthPayload>> {
    ApiResponse::ok(HealthPayload {
        status: "ok",
        cache_connected: state.cache.is_connected(),
        timestamp: Utc::now(),
    })
}
