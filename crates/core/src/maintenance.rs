//! Maintenance-store collaborator seam.
//!
//! The CRUD side of the system owns the real document store; the alert
//! engine only ever asks it one question: which incomplete maintenances are
//! due inside a date range. [`MaintenanceStore`] is that seam, and
//! [`InMemoryMaintenanceStore`] is the stand-in used by tests and by the
//! default wiring until a production store is bound.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Denormalized pending maintenance record, machine fields already joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRecord {
    pub id: String,
    pub machine_id: String,
    pub machine_model: String,
    pub machine_serial: String,
    pub client: String,
    pub location: String,
    pub due_date: DateTime<Utc>,
    pub maintenance_type: String,
    pub technician_id: String,
    pub spare_parts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    pub is_completed: bool,
}

/// Read access to pending maintenance records.
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Incomplete records with `from <= due_date <= to`, ascending by due date.
    async fn find_pending_due_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MaintenanceRecord>>;
}

// ── In-memory store ─────────────────────────────────────────────────

/// Map-backed store for tests and default wiring.
#[derive(Default)]
pub struct InMemoryMaintenanceStore {
    records: RwLock<Vec<MaintenanceRecord>>,
}

impl InMemoryMaintenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: MaintenanceRecord) {
        self.records.write().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MaintenanceStore for InMemoryMaintenanceStore {
    async fn find_pending_due_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MaintenanceRecord>> {
        let records = self.records.read().await;
        let mut hits: Vec<MaintenanceRecord> = records
            .iter()
            .filter(|r| !r.is_completed && r.due_date >= from && r.due_date <= to)
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.due_date);
        Ok(hits)
    }
}
