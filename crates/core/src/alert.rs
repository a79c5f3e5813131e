//! Alert evaluation: pure functions deciding whether a pending maintenance
//! record is due for warning, how urgent it is, and its stable identity.
//!
//! Two priority mappings exist on purpose. The scan path never sees overdue
//! records (the candidate query filters them out), so its table starts at
//! `daysRemaining <= 1`. The dashboard listing path reads a wider window and
//! explicitly maps overdue records to `critical`. Keep them separate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::maintenance::MaintenanceRecord;

/// Milliseconds in one day; the divisor of the `daysRemaining` ceiling.
const DAY_MS: i64 = 86_400_000;

/// Days before the due date inside which the scan raises an alert.
pub const ALERT_WINDOW_DAYS: i64 = 7;

// ── Priority ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Scan-time tier table. Callers guarantee `days_remaining >= 0`.
pub fn scan_priority(days_remaining: i64) -> Priority {
    if days_remaining <= 1 {
        Priority::Critical
    } else if days_remaining <= 3 {
        Priority::High
    } else if days_remaining <= 5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Read-path tier table for on-demand listings: overdue maps to critical,
/// and the medium band extends to the full 7-day window.
pub fn listing_priority(days_remaining: i64) -> Priority {
    if days_remaining < 0 {
        Priority::Critical
    } else if days_remaining <= 3 {
        Priority::High
    } else if days_remaining <= 7 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

// ── MaintenanceAlert ────────────────────────────────────────────────

/// Point-in-time warning snapshot for one pending maintenance.
///
/// Machine fields are copied at evaluation time and never re-fetched; the
/// alert describes the world as it was when the scan saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceAlert {
    /// Deterministic dedup key: `maintenance_{maintenanceId}_{dueEpochMillis}`.
    pub id: String,
    pub maintenance_id: String,
    pub machine_id: String,
    pub machine_model: String,
    pub machine_serial: String,
    pub client: String,
    pub due_date: DateTime<Utc>,
    pub days_remaining: i64,
    pub maintenance_type: String,
    pub priority: Priority,
    pub location: String,
    pub technician_id: String,
    pub spare_parts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

/// Derive the stable alert identity from the record id and due instant.
///
/// Editing a maintenance's due date changes the identity, so the edited
/// record alerts again as a new event.
pub fn alert_id(maintenance_id: &str, due_date: DateTime<Utc>) -> String {
    format!("maintenance_{}_{}", maintenance_id, due_date.timestamp_millis())
}

/// Whole days until `due`, rounded up. A due date 20 hours away counts as 1.
pub fn days_remaining(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let delta_ms = due.timestamp_millis() - now.timestamp_millis();
    // `i64::div_ceil` is unstable; this is the same ceiling division on stable.
    let q = delta_ms.div_euclid(DAY_MS);
    if delta_ms.rem_euclid(DAY_MS) > 0 {
        q + 1
    } else {
        q
    }
}

/// Evaluate one pending record against the alert window.
///
/// Returns `None` outside `[0, 7]` days remaining. Overdue records are the
/// candidate query's problem, not this function's.
pub fn evaluate(record: &MaintenanceRecord, now: DateTime<Utc>) -> Option<MaintenanceAlert> {
    let days = days_remaining(record.due_date, now);
    if !(0..=ALERT_WINDOW_DAYS).contains(&days) {
        return None;
    }

    Some(MaintenanceAlert {
        id: alert_id(&record.id, record.due_date),
        maintenance_id: record.id.clone(),
        machine_id: record.machine_id.clone(),
        machine_model: record.machine_model.clone(),
        machine_serial: record.machine_serial.clone(),
        client: record.client.clone(),
        due_date: record.due_date,
        days_remaining: days,
        maintenance_type: record.maintenance_type.clone(),
        priority: scan_priority(days),
        location: record.location.clone(),
        technician_id: record.technician_id.clone(),
        spare_parts: record.spare_parts.clone(),
        observations: record.observations.clone(),
    })
}

// ── Tests ───────────────────────────────────────────────────────────
